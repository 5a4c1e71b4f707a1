//! Direct-touch pipeline: touchscreens and single-touch absolute devices
//!
//! Multitouch slots are tracked through the type-B protocol
//! (`ABS_MT_SLOT`/`ABS_MT_TRACKING_ID`); every touch gets a dense seat-wide
//! slot on its way down and frees it on the way up, so consumers can follow a
//! finger across all touch devices of a seat. Single-touch devices without MT
//! axes are handled through `BTN_TOUCH` plus `ABS_X`/`ABS_Y` and occupy one
//! seat slot like any other contact.

use super::{calibrate, DispatchCtx};
use crate::device::Device;
use crate::evdev::{codes, AbsInfo, EvdevEvent, EventKind};
use crate::event::{
    Event, TouchCancelEvent, TouchDownEvent, TouchFrameEvent, TouchMotionEvent, TouchUpEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotChange {
    None,
    Began,
    Updated,
    Ended,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    active: bool,
    seat_slot: u32,
    x: f64,
    y: f64,
    change: SlotChange,
}

impl Slot {
    fn idle() -> Self {
        Slot {
            active: false,
            seat_slot: 0,
            x: 0.0,
            y: 0.0,
            change: SlotChange::None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct TouchDispatch {
    slots: Vec<Slot>,
    current_slot: usize,
    abs_x: AbsInfo,
    abs_y: AbsInfo,
    /// `BTN_TOUCH` transition for single-touch devices
    st_pending: Option<bool>,
}

impl TouchDispatch {
    pub(crate) fn new(device: &Device) -> Self {
        let info = device.info();
        let abs_x = info
            .abs_info(codes::ABS_MT_POSITION_X)
            .or_else(|| info.abs_info(codes::ABS_X))
            .unwrap_or(AbsInfo::new(0, 0, 0));
        let abs_y = info
            .abs_info(codes::ABS_MT_POSITION_Y)
            .or_else(|| info.abs_info(codes::ABS_Y))
            .unwrap_or(AbsInfo::new(0, 0, 0));
        TouchDispatch {
            slots: vec![Slot::idle(); (info.slot_count.max(1)) as usize],
            current_slot: 0,
            abs_x,
            abs_y,
            st_pending: None,
        }
    }

    fn mark_update(slot: &mut Slot) {
        if slot.change == SlotChange::None {
            slot.change = SlotChange::Updated;
        }
    }

    pub(crate) fn process(&mut self, _ctx: &mut DispatchCtx<'_>, event: &EvdevEvent) {
        match (event.kind, event.code) {
            (EventKind::Absolute, codes::ABS_MT_SLOT) => {
                let idx = event.value.max(0) as usize;
                if idx < self.slots.len() {
                    self.current_slot = idx;
                } else {
                    tracing::error!(slot = idx, "MT slot beyond advertised count, clamping");
                    self.current_slot = self.slots.len() - 1;
                }
            }
            (EventKind::Absolute, codes::ABS_MT_TRACKING_ID) => {
                let slot = &mut self.slots[self.current_slot];
                if event.value >= 0 {
                    slot.change = SlotChange::Began;
                } else if slot.active || slot.change == SlotChange::Began {
                    slot.change = SlotChange::Ended;
                }
            }
            (EventKind::Absolute, codes::ABS_MT_POSITION_X) => {
                let slot = &mut self.slots[self.current_slot];
                slot.x = event.value as f64;
                Self::mark_update(slot);
            }
            (EventKind::Absolute, codes::ABS_MT_POSITION_Y) => {
                let slot = &mut self.slots[self.current_slot];
                slot.y = event.value as f64;
                Self::mark_update(slot);
            }
            // single-touch fallback
            (EventKind::Absolute, codes::ABS_X) => {
                let slot = &mut self.slots[0];
                slot.x = event.value as f64;
                Self::mark_update(slot);
            }
            (EventKind::Absolute, codes::ABS_Y) => {
                let slot = &mut self.slots[0];
                slot.y = event.value as f64;
                Self::mark_update(slot);
            }
            (EventKind::Key, codes::BTN_TOUCH) if event.value != 2 => {
                self.st_pending = Some(event.value != 0);
            }
            _ => {}
        }
    }

    pub(crate) fn frame(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        if let Some(down) = self.st_pending.take() {
            let slot = &mut self.slots[0];
            slot.change = if down {
                SlotChange::Began
            } else {
                SlotChange::Ended
            };
        }

        let matrix = ctx.device.config().calibration;
        let mut dirty = false;

        for (idx, slot) in self.slots.iter_mut().enumerate() {
            let change = std::mem::replace(&mut slot.change, SlotChange::None);
            let (x, y) = calibrate(slot.x, slot.y, &self.abs_x, &self.abs_y, &matrix);
            match change {
                SlotChange::None => {}
                SlotChange::Began => {
                    if slot.active {
                        tracing::error!(slot = idx, "touch began twice, restarting contact");
                        ctx.device.seat().release_slot(slot.seat_slot);
                    }
                    slot.active = true;
                    slot.seat_slot = ctx.device.seat().acquire_slot();
                    dirty = true;
                    ctx.queue.push(Event::TouchDown {
                        event: TouchDownEvent {
                            device: ctx.device.clone(),
                            time,
                            slot: idx as u32,
                            seat_slot: slot.seat_slot,
                            x,
                            y,
                            abs_x: self.abs_x,
                            abs_y: self.abs_y,
                        },
                    });
                }
                SlotChange::Updated if slot.active => {
                    dirty = true;
                    ctx.queue.push(Event::TouchMotion {
                        event: TouchMotionEvent {
                            device: ctx.device.clone(),
                            time,
                            slot: idx as u32,
                            seat_slot: slot.seat_slot,
                            x,
                            y,
                            abs_x: self.abs_x,
                            abs_y: self.abs_y,
                        },
                    });
                }
                SlotChange::Updated => {}
                SlotChange::Ended => {
                    if !slot.active {
                        continue;
                    }
                    slot.active = false;
                    dirty = true;
                    ctx.device.seat().release_slot(slot.seat_slot);
                    ctx.queue.push(Event::TouchUp {
                        event: TouchUpEvent {
                            device: ctx.device.clone(),
                            time,
                            slot: idx as u32,
                            seat_slot: slot.seat_slot,
                        },
                    });
                }
            }
        }

        if dirty {
            ctx.queue.push(Event::TouchFrame {
                event: TouchFrameEvent {
                    device: ctx.device.clone(),
                    time,
                },
            });
        }
    }

    /// Cancel every active sequence, e.g. on device removal
    pub(crate) fn suspend(&mut self, ctx: &mut DispatchCtx<'_>, time: u64) {
        let mut dirty = false;
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            slot.change = SlotChange::None;
            if slot.active {
                slot.active = false;
                dirty = true;
                ctx.device.seat().release_slot(slot.seat_slot);
                ctx.queue.push(Event::TouchCancel {
                    event: TouchCancelEvent {
                        device: ctx.device.clone(),
                        time,
                        slot: idx as u32,
                        seat_slot: slot.seat_slot,
                    },
                });
            }
        }
        self.st_pending = None;
        if dirty {
            ctx.queue.push(Event::TouchFrame {
                event: TouchFrameEvent {
                    device: ctx.device.clone(),
                    time,
                },
            });
        }
    }
}
