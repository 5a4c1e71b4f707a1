//! The process-wide context: event queue, device registry and dispatch loop
//!
//! A [`Context`] owns everything: the outgoing event FIFO, the registered
//! devices with their dispatchers, the seats, the device groups, the
//! context-global tool table and the timer wheel. The host integrates it into
//! its main loop by polling [`Context::fd`] for readability and calling
//! [`Context::dispatch`] on every wakeup, then draining
//! [`Context::next_event`] until it returns `None`.
//!
//! All state mutation happens inside calls from the thread owning the
//! context; timers are fired from within `dispatch` when their expiry has
//! passed, and an internal timerfd makes the context fd readable when a
//! timeout would fire before the next natural device wakeup.

use indexmap::IndexMap;
use rustix::event::epoll;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::fmt;
use std::os::unix::io::{AsFd, BorrowedFd, OwnedFd};

use crate::device::{Device, DeviceClass, DeviceGroup, DeviceId, DeviceInfo, SendEventsMode};
use crate::dispatch::{DeviceDispatch, DispatchCtx, KeyNotify};
use crate::evdev::{EventSource, SourceError};
use crate::event::tablet::TabletTool;
use crate::event::Event;
use crate::seat::Seat;
use crate::timer::TimerWheel;
use crate::utils::{Clock, Monotonic};

/// The restricted open/close interface the host provides
///
/// Device nodes usually require privileges the library should not hold, so
/// opening and closing them is delegated, mirroring how logind-style session
/// brokers hand out file descriptors. `open` is called for every device
/// registration and again for every [`Context::resume`]; `close` receives the
/// source back on removal, suspend and destruction.
pub trait OpenRestricted: fmt::Debug {
    /// Open the device node identified by `sysname` and wrap it in a source
    fn open(&mut self, sysname: &str) -> std::io::Result<Box<dyn EventSource>>;

    /// Return a source for closing; the default just drops it
    fn close(&mut self, source: Box<dyn EventSource>) {
        drop(source);
    }
}

/// Errors surfaced by context operations
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// Creating the context's file descriptors failed
    #[error("failed to set up the context file descriptors")]
    Setup(#[source] rustix::io::Errno),
    /// The host's open-restricted callback failed for a device
    #[error("failed to open device {sysname}")]
    Open {
        /// Kernel sysname of the device that failed to open
        sysname: String,
        /// Underlying error from the host callback
        #[source]
        source: std::io::Error,
    },
    /// Reading a device stream failed with an unexpected error
    #[error("failed to read from device {sysname}")]
    Read {
        /// Kernel sysname of the device that failed
        sysname: String,
        /// Underlying source error
        #[source]
        source: std::io::Error,
    },
}

/// The outgoing event FIFO, with a wake pipe so the caller's poll returns
pub(crate) struct EventQueue {
    events: VecDeque<Event>,
    wake_write: Option<OwnedFd>,
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.events.len())
            .finish()
    }
}

impl EventQueue {
    fn new(wake_write: Option<OwnedFd>) -> Self {
        EventQueue {
            events: VecDeque::new(),
            wake_write,
        }
    }

    pub(crate) fn push(&mut self, event: Event) {
        self.events.push_back(event);
        if let Some(fd) = &self.wake_write {
            // a full pipe already wakes the caller; EAGAIN is fine
            let _ = rustix::io::write(fd, &[1]);
        }
    }

    fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }
}

#[derive(Debug)]
struct DeviceEntry {
    device: Device,
    dispatch: DeviceDispatch,
    source: Option<Box<dyn EventSource>>,
    /// The dispatcher was quiesced because send-events is disabled
    sendevents_suspended: bool,
}

/// State shared between the registry and every dispatcher
#[derive(Debug)]
struct Shared {
    queue: EventQueue,
    timers: TimerWheel,
    serial_tools: Vec<TabletTool>,
    key_notify: SmallVec<[KeyNotify; 4]>,
}

macro_rules! dispatch_ctx {
    ($entry:expr, $shared:expr) => {
        DispatchCtx {
            device: &$entry.device,
            queue: &mut $shared.queue,
            timers: &mut $shared.timers,
            serial_tools: &mut $shared.serial_tools,
            key_notify: &mut $shared.key_notify,
        }
    };
}

/// The process-wide input context
pub struct Context {
    shared: Shared,
    devices: IndexMap<DeviceId, DeviceEntry>,
    seats: Vec<Seat>,
    groups: Vec<(String, DeviceGroup)>,
    opener: Box<dyn OpenRestricted>,
    clock: Clock<Monotonic>,
    next_id: u32,
    epoll_fd: OwnedFd,
    timer_fd: OwnedFd,
    wake_read: OwnedFd,
    /// Descriptors of the devices closed by suspend, in enumeration order
    suspended_infos: Vec<DeviceInfo>,
    test_now: Option<u64>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("devices", &self.devices.len())
            .field("seats", &self.seats.len())
            .field("queued_events", &self.shared.queue.events.len())
            .finish_non_exhaustive()
    }
}

const TOKEN_WAKE: u64 = 0;
const TOKEN_TIMER: u64 = 1;
const TOKEN_DEVICE_BASE: u64 = 16;

impl Context {
    /// Create a context using the host's restricted open/close callbacks
    pub fn new(opener: Box<dyn OpenRestricted>) -> Result<Context, ContextError> {
        let epoll_fd = epoll::create(epoll::CreateFlags::CLOEXEC).map_err(ContextError::Setup)?;
        let (wake_read, wake_write) = rustix::pipe::pipe_with(
            rustix::pipe::PipeFlags::NONBLOCK | rustix::pipe::PipeFlags::CLOEXEC,
        )
        .map_err(ContextError::Setup)?;
        let timer_fd = rustix::time::timerfd_create(
            rustix::time::TimerfdClockId::Monotonic,
            rustix::time::TimerfdFlags::CLOEXEC | rustix::time::TimerfdFlags::NONBLOCK,
        )
        .map_err(ContextError::Setup)?;
        epoll::add(
            &epoll_fd,
            &wake_read,
            epoll::EventData::new_u64(TOKEN_WAKE),
            epoll::EventFlags::IN,
        )
        .map_err(ContextError::Setup)?;
        epoll::add(
            &epoll_fd,
            &timer_fd,
            epoll::EventData::new_u64(TOKEN_TIMER),
            epoll::EventFlags::IN,
        )
        .map_err(ContextError::Setup)?;

        Ok(Context {
            shared: Shared {
                queue: EventQueue::new(Some(wake_write)),
                timers: TimerWheel::new(),
                serial_tools: Vec::new(),
                key_notify: SmallVec::new(),
            },
            devices: IndexMap::new(),
            seats: Vec::new(),
            groups: Vec::new(),
            opener,
            clock: Clock::new(),
            next_id: 0,
            epoll_fd,
            timer_fd,
            wake_read,
            suspended_infos: Vec::new(),
            test_now: None,
        })
    }

    /// The file descriptor the caller polls for readability
    ///
    /// Readable whenever events are queued or a timer expired; call
    /// [`Context::dispatch`] on every wakeup.
    pub fn fd(&self) -> BorrowedFd<'_> {
        self.epoll_fd.as_fd()
    }

    fn now_ms(&self) -> u64 {
        match self.test_now {
            Some(t) => t,
            None => self.clock.now().as_millis(),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_now(&mut self, now: u64) {
        self.test_now = Some(now);
    }

    fn seat_for(&mut self, physical: &str) -> Seat {
        if let Some(seat) = self
            .seats
            .iter()
            .find(|s| s.physical_name() == physical && s.logical_name() == "default")
        {
            return seat.clone();
        }
        let seat = Seat::new(physical, "default");
        self.seats.push(seat.clone());
        seat
    }

    fn group_for(&mut self, key: Option<&str>) -> DeviceGroup {
        match key {
            None => DeviceGroup::new(),
            Some(key) => {
                if let Some((_, group)) = self.groups.iter().find(|(k, _)| k == key) {
                    group.clone()
                } else {
                    let group = DeviceGroup::new();
                    self.groups.push((key.to_owned(), group.clone()));
                    group
                }
            }
        }
    }

    /// Register a device described by `info`, opening it through the host
    ///
    /// The device-added event is queued before this returns, so the caller
    /// can configure the device before its first input event is seen.
    pub fn add_device(&mut self, info: DeviceInfo) -> Result<Device, ContextError> {
        let source = self
            .opener
            .open(&info.sysname)
            .map_err(|source| ContextError::Open {
                sysname: info.sysname.clone(),
                source,
            })?;
        Ok(self.add_opened(info, source))
    }

    fn add_opened(&mut self, info: DeviceInfo, source: Box<dyn EventSource>) -> Device {
        let seat = self.seat_for(&info.seat);
        let group = self.group_for(info.group.as_deref());
        let id = DeviceId(self.next_id);
        self.next_id += 1;

        tracing::info!(sysname = %info.sysname, name = %info.name, "new device");
        let device = Device::new(id, info, seat, group);
        let dispatch = DeviceDispatch::for_device(&device);
        if let Some(fd) = source.poll_fd() {
            if let Err(err) = epoll::add(
                &self.epoll_fd,
                fd,
                epoll::EventData::new_u64(TOKEN_DEVICE_BASE + id.0 as u64),
                epoll::EventFlags::IN,
            ) {
                tracing::warn!(?err, "could not register device fd for polling");
            }
        }

        self.shared.queue.push(Event::DeviceAdded {
            device: device.clone(),
        });
        let mut entry = DeviceEntry {
            device: device.clone(),
            dispatch,
            source: Some(source),
            sendevents_suspended: false,
        };
        let mut ctx = dispatch_ctx!(entry, self.shared);
        entry.dispatch.post_added(&mut ctx);
        self.devices.insert(id, entry);
        device
    }

    /// Remove a device explicitly; the inverse of [`Context::add_device`]
    ///
    /// All gesture state is force-released (pressed buttons and keys get
    /// release events, touches are cancelled, tools leave proximity) before
    /// the device-removed event is queued.
    pub fn remove_device(&mut self, device: &Device) {
        let now = self.now_ms();
        self.remove_by_id(device.id(), now);
    }

    fn remove_by_id(&mut self, id: DeviceId, time: u64) {
        let Some(mut entry) = self.devices.shift_remove(&id) else {
            return;
        };
        tracing::info!(sysname = entry.device.sysname(), "removed device");
        {
            let mut ctx = dispatch_ctx!(entry, self.shared);
            entry.dispatch.suspend(&mut ctx, time);
        }
        self.shared.timers.cancel_device(id);
        if let Some(source) = entry.source.take() {
            if let Some(fd) = source.poll_fd() {
                let _ = epoll::delete(&self.epoll_fd, fd);
            }
            self.opener.close(source);
        }
        entry.device.mark_dead();
        self.shared.queue.push(Event::DeviceRemoved {
            device: entry.device,
        });
    }

    /// Move a device to a differently-named logical seat
    ///
    /// The device record is destroyed and a new one created on the target
    /// seat: the caller receives a device-removed event for the old record
    /// *before* the device-added for its replacement, and the returned handle
    /// is a different device identity.
    pub fn set_seat_logical_name(
        &mut self,
        device: &Device,
        logical: &str,
    ) -> Result<Device, ContextError> {
        let info = device.info().clone();
        let physical = device.seat().physical_name().to_owned();
        let now = self.now_ms();
        self.remove_by_id(device.id(), now);

        let seat = if let Some(seat) = self
            .seats
            .iter()
            .find(|s| s.physical_name() == physical && s.logical_name() == logical)
        {
            seat.clone()
        } else {
            let seat = Seat::new(&physical, logical);
            self.seats.push(seat.clone());
            seat
        };

        let source = self
            .opener
            .open(&info.sysname)
            .map_err(|source| ContextError::Open {
                sysname: info.sysname.clone(),
                source,
            })?;
        let id = DeviceId(self.next_id);
        self.next_id += 1;
        let new_device = Device::new(id, info, seat, device.device_group());
        let dispatch = DeviceDispatch::for_device(&new_device);
        self.shared.queue.push(Event::DeviceAdded {
            device: new_device.clone(),
        });
        self.devices.insert(
            id,
            DeviceEntry {
                device: new_device.clone(),
                dispatch,
                source: Some(source),
                sendevents_suspended: false,
            },
        );
        Ok(new_device)
    }

    /// Close every device, emitting device-removed for each
    ///
    /// The set of devices is remembered; [`Context::resume`] re-opens them by
    /// sysname in the original enumeration order.
    pub fn suspend(&mut self) {
        let now = self.now_ms();
        let ids: Vec<DeviceId> = self.devices.keys().copied().collect();
        self.suspended_infos = self
            .devices
            .values()
            .map(|e| e.device.info().clone())
            .collect();
        for id in ids {
            self.remove_by_id(id, now);
        }
    }

    /// Re-open the devices closed by [`Context::suspend`]
    ///
    /// A device that fails to open is silently dropped from the set; its
    /// removal was already reported at suspend time.
    pub fn resume(&mut self) {
        for info in std::mem::take(&mut self.suspended_infos) {
            match self.opener.open(&info.sysname) {
                Ok(source) => {
                    self.add_opened(info, source);
                }
                Err(err) => {
                    tracing::info!(sysname = %info.sysname, ?err, "device did not reappear at resume");
                }
            }
        }
    }

    /// All seats currently known to the context
    pub fn seats(&self) -> Vec<Seat> {
        self.seats.clone()
    }

    /// Pull the next queued event, `None` when the queue is drained
    pub fn next_event(&mut self) -> Option<Event> {
        self.shared.queue.pop()
    }

    fn fire_timers(&mut self, now: u64) {
        while let Some((token, expiry)) = self.shared.timers.pop_expired(now) {
            let Some(entry) = self.devices.get_mut(&token.device) else {
                continue;
            };
            let mut ctx = dispatch_ctx!(entry, self.shared);
            entry.dispatch.timeout(&mut ctx, token.kind, expiry);
        }
    }

    fn fan_out_key_activity(&mut self, seat: &Seat, origin: DeviceId) {
        let notes: SmallVec<[KeyNotify; 4]> = std::mem::take(&mut self.shared.key_notify);
        if notes.is_empty() {
            return;
        }
        let ids: Vec<DeviceId> = self.devices.keys().copied().collect();
        for id in ids {
            if id == origin {
                continue;
            }
            let Some(entry) = self.devices.get_mut(&id) else {
                continue;
            };
            if entry.device.class() != DeviceClass::Touchpad || entry.device.seat() != *seat {
                continue;
            }
            let mut ctx = dispatch_ctx!(entry, self.shared);
            for note in &notes {
                entry.dispatch.keyboard_activity(&mut ctx, *note);
            }
        }
    }

    /// Process everything readable: device streams and expired timers
    ///
    /// Each frame may queue zero or more events; drain them afterwards with
    /// [`Context::next_event`].
    pub fn dispatch(&mut self) -> Result<(), ContextError> {
        let mut buf = [0u8; 64];
        while matches!(rustix::io::read(&self.wake_read, &mut buf), Ok(n) if n > 0) {}
        let _ = rustix::io::read(&self.timer_fd, &mut buf);

        let now = self.now_ms();
        self.fire_timers(now);

        let ids: Vec<DeviceId> = self.devices.keys().copied().collect();
        let mut gone: Vec<DeviceId> = Vec::new();
        for id in ids {
            loop {
                let Some(entry) = self.devices.get_mut(&id) else {
                    break;
                };
                // send-events transitions are applied at the dispatch boundary
                let mode = entry.device.config().send_events;
                if mode == SendEventsMode::Disabled && !entry.sendevents_suspended {
                    entry.sendevents_suspended = true;
                    let mut ctx = dispatch_ctx!(entry, self.shared);
                    entry.dispatch.suspend(&mut ctx, now);
                } else if mode == SendEventsMode::Enabled && entry.sendevents_suspended {
                    entry.sendevents_suspended = false;
                }

                let Some(source) = entry.source.as_mut() else {
                    break;
                };
                let event = match source.next_event() {
                    Ok(Some(event)) => event,
                    Ok(None) => break,
                    Err(SourceError::Gone) => {
                        gone.push(id);
                        break;
                    }
                    Err(SourceError::Io(err)) => {
                        return Err(ContextError::Read {
                            sysname: entry.device.sysname().to_owned(),
                            source: err,
                        });
                    }
                };
                let muted = entry.sendevents_suspended;

                // timers scheduled before this frame fire first, so
                // timer-driven and event-driven emissions stay ordered
                self.fire_timers(event.time);

                let Some(entry) = self.devices.get_mut(&id) else {
                    break;
                };
                if muted {
                    continue;
                }
                if event.is_frame_end() {
                    let seat = entry.device.seat();
                    {
                        let mut ctx = dispatch_ctx!(entry, self.shared);
                        entry.dispatch.frame(&mut ctx, event.time);
                    }
                    self.fan_out_key_activity(&seat, id);
                } else {
                    let mut ctx = dispatch_ctx!(entry, self.shared);
                    entry.dispatch.process(&mut ctx, &event);
                }
            }
        }
        for id in gone {
            tracing::info!(?id, "device gone, removing");
            self.remove_by_id(id, now);
        }

        self.fire_timers(self.now_ms());
        self.rearm_timerfd();
        Ok(())
    }

    fn rearm_timerfd(&mut self) {
        let spec = rustix::time::Itimerspec {
            it_interval: rustix::time::Timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
            it_value: match self.shared.timers.next_expiry() {
                // absolute CLOCK_MONOTONIC expiry; zero disarms
                Some(ms) => rustix::time::Timespec {
                    tv_sec: (ms / 1000) as rustix::time::Secs,
                    tv_nsec: ((ms % 1000) * 1_000_000) as rustix::time::Nsecs,
                },
                None => rustix::time::Timespec {
                    tv_sec: 0,
                    tv_nsec: 0,
                },
            },
        };
        if let Err(err) = rustix::time::timerfd_settime(
            &self.timer_fd,
            rustix::time::TimerfdTimerFlags::ABSTIME,
            &spec,
        ) {
            tracing::warn!(?err, "failed to arm the timerfd");
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let ids: Vec<DeviceId> = self.devices.keys().copied().collect();
        let now = self.now_ms();
        for id in ids {
            self.remove_by_id(id, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{
        ButtonsetInfo, ClickMethod, DeviceInfo, DeviceQuirks, ScrollMethod,
    };
    use crate::evdev::{codes, AbsInfo, EvdevEvent};
    use crate::event::tablet::ProximityState;
    use crate::event::{Axis, AxisSource, ButtonState, Event, KeyState};
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Default)]
    struct TestStream {
        queue: Arc<Mutex<VecDeque<EvdevEvent>>>,
        gone: Arc<AtomicBool>,
    }

    #[derive(Debug)]
    struct TestSource(TestStream);

    impl EventSource for TestSource {
        fn next_event(&mut self) -> Result<Option<EvdevEvent>, SourceError> {
            if self.0.gone.load(Ordering::SeqCst) {
                return Err(SourceError::Gone);
            }
            Ok(self.0.queue.lock().unwrap().pop_front())
        }
    }

    #[derive(Debug, Clone, Default)]
    struct TestOpener {
        streams: Arc<Mutex<HashMap<String, TestStream>>>,
        failing: Arc<Mutex<HashSet<String>>>,
    }

    impl TestOpener {
        fn stream(&self, sysname: &str) -> TestStream {
            self.streams
                .lock()
                .unwrap()
                .entry(sysname.to_owned())
                .or_default()
                .clone()
        }

        fn push(&self, sysname: &str, events: &[EvdevEvent]) {
            let stream = self.stream(sysname);
            stream.queue.lock().unwrap().extend(events.iter().copied());
        }

        fn set_gone(&self, sysname: &str) {
            self.stream(sysname).gone.store(true, Ordering::SeqCst);
        }

        fn fail(&self, sysname: &str) {
            self.failing.lock().unwrap().insert(sysname.to_owned());
        }
    }

    impl OpenRestricted for TestOpener {
        fn open(&mut self, sysname: &str) -> std::io::Result<Box<dyn EventSource>> {
            if self.failing.lock().unwrap().contains(sysname) {
                return Err(std::io::Error::from(std::io::ErrorKind::NotFound));
            }
            Ok(Box::new(TestSource(self.stream(sysname))))
        }
    }

    fn context() -> (Context, TestOpener) {
        let opener = TestOpener::default();
        let ctx = Context::new(Box::new(opener.clone())).expect("context setup");
        (ctx, opener)
    }

    fn drain(ctx: &mut Context) -> Vec<Event> {
        let mut out = Vec::new();
        while let Some(ev) = ctx.next_event() {
            out.push(ev);
        }
        out
    }

    fn button_events(events: &[Event]) -> Vec<(u64, u32, ButtonState)> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::PointerButton { event } => Some((event.time, event.button, event.state)),
                _ => None,
            })
            .collect()
    }

    /// 100x70 mm clickpad, 20 units/mm, 5 slots
    fn touchpad_info(sysname: &str) -> DeviceInfo {
        DeviceInfo::touchpad(
            sysname,
            "test touchpad",
            AbsInfo::new(0, 2000, 20),
            AbsInfo::new(0, 1400, 20),
            5,
        )
        .with_quirks(DeviceQuirks {
            clickpad: true,
            ..Default::default()
        })
    }

    fn touch_down(time: u64, slot: i32, x: i32, y: i32) -> Vec<EvdevEvent> {
        vec![
            EvdevEvent::abs(time, codes::ABS_MT_SLOT, slot),
            EvdevEvent::abs(time, codes::ABS_MT_TRACKING_ID, 100 + slot),
            EvdevEvent::abs(time, codes::ABS_MT_POSITION_X, x),
            EvdevEvent::abs(time, codes::ABS_MT_POSITION_Y, y),
            EvdevEvent::syn(time),
        ]
    }

    fn touch_move(time: u64, slot: i32, x: i32, y: i32) -> Vec<EvdevEvent> {
        vec![
            EvdevEvent::abs(time, codes::ABS_MT_SLOT, slot),
            EvdevEvent::abs(time, codes::ABS_MT_POSITION_X, x),
            EvdevEvent::abs(time, codes::ABS_MT_POSITION_Y, y),
            EvdevEvent::syn(time),
        ]
    }

    fn touch_up(time: u64, slot: i32) -> Vec<EvdevEvent> {
        vec![
            EvdevEvent::abs(time, codes::ABS_MT_SLOT, slot),
            EvdevEvent::abs(time, codes::ABS_MT_TRACKING_ID, -1),
            EvdevEvent::syn(time),
        ]
    }

    fn tap_touchpad(ctx: &mut Context, opener: &TestOpener) -> Device {
        let device = ctx.add_device(touchpad_info("event4")).unwrap();
        assert!(matches!(ctx.next_event(), Some(Event::DeviceAdded { .. })));
        device.config_tap_set_enabled(true);
        let _ = opener;
        device
    }

    #[test]
    fn device_added_queued_before_first_read() {
        let (mut ctx, _opener) = context();
        let device = ctx.add_device(DeviceInfo::keyboard("event0", "kbd")).unwrap();
        let events = drain(&mut ctx);
        assert!(
            matches!(&events[..], [Event::DeviceAdded { device: d }] if *d == device),
            "expected exactly the added event, got {events:?}"
        );
    }

    #[test]
    fn doubletap_emits_two_ordered_pairs() {
        // S1: down@0 up@50 down@100 up@150, then the tap timers finalize
        let (mut ctx, opener) = context();
        tap_touchpad(&mut ctx, &opener);
        opener.push("event4", &touch_down(0, 0, 1000, 700));
        opener.push("event4", &touch_up(50, 0));
        opener.push("event4", &touch_down(100, 0, 1000, 700));
        opener.push("event4", &touch_up(150, 0));
        ctx.set_now(600);
        ctx.dispatch().unwrap();
        let buttons = button_events(&drain(&mut ctx));
        assert_eq!(
            buttons,
            vec![
                (50, codes::BTN_LEFT as u32, ButtonState::Pressed),
                (180, codes::BTN_LEFT as u32, ButtonState::Released),
                (100, codes::BTN_LEFT as u32, ButtonState::Pressed),
                (330, codes::BTN_LEFT as u32, ButtonState::Released),
            ]
        );
    }

    #[test]
    fn two_finger_tap_is_right_click() {
        // S2: two fingers land, both lift within the tap window
        let (mut ctx, opener) = context();
        tap_touchpad(&mut ctx, &opener);
        opener.push("event4", &touch_down(0, 0, 1000, 700));
        opener.push("event4", &touch_down(5, 1, 1400, 700));
        let mut both_up = vec![
            EvdevEvent::abs(60, codes::ABS_MT_SLOT, 0),
            EvdevEvent::abs(60, codes::ABS_MT_TRACKING_ID, -1),
            EvdevEvent::abs(60, codes::ABS_MT_SLOT, 1),
            EvdevEvent::abs(60, codes::ABS_MT_TRACKING_ID, -1),
        ];
        both_up.push(EvdevEvent::syn(60));
        opener.push("event4", &both_up);
        ctx.set_now(600);
        ctx.dispatch().unwrap();
        let buttons = button_events(&drain(&mut ctx));
        assert_eq!(
            buttons,
            vec![
                (60, codes::BTN_RIGHT as u32, ButtonState::Pressed),
                (240, codes::BTN_RIGHT as u32, ButtonState::Released),
            ]
        );
    }

    #[test]
    fn tap_and_drag_holds_left_through_motion() {
        // S3: tap, re-land, drag, lift; release follows the drag grace
        let (mut ctx, opener) = context();
        tap_touchpad(&mut ctx, &opener);
        opener.push("event4", &touch_down(0, 0, 1000, 700));
        opener.push("event4", &touch_up(50, 0));
        opener.push("event4", &touch_down(100, 0, 1000, 700));
        for step in 1..=40 {
            opener.push(
                "event4",
                &touch_move(100 + step as u64, 0, 1000 + step * 15, 700 + step * 10),
            );
        }
        opener.push("event4", &touch_up(200, 0));
        ctx.set_now(900);
        ctx.dispatch().unwrap();
        let events = drain(&mut ctx);
        let buttons = button_events(&events);
        assert_eq!(
            buttons,
            vec![
                (50, codes::BTN_LEFT as u32, ButtonState::Pressed),
                (500, codes::BTN_LEFT as u32, ButtonState::Released),
            ]
        );
        let motions = events
            .iter()
            .filter(|e| matches!(e, Event::PointerMotion { .. }))
            .count();
        assert!(motions > 10, "expected motion during the drag, got {motions}");
    }

    #[test]
    fn softbutton_right_region_click() {
        // S4: finger in the bottom-right region, physical click
        let (mut ctx, opener) = context();
        let device = ctx.add_device(touchpad_info("event4")).unwrap();
        drain(&mut ctx);
        let _ = device;
        opener.push("event4", &touch_down(0, 0, 1800, 1260));
        opener.push(
            "event4",
            &[
                EvdevEvent::key(10, codes::BTN_LEFT, true),
                EvdevEvent::syn(10),
            ],
        );
        opener.push(
            "event4",
            &[
                EvdevEvent::key(50, codes::BTN_LEFT, false),
                EvdevEvent::syn(50),
            ],
        );
        ctx.set_now(100);
        ctx.dispatch().unwrap();
        let buttons = button_events(&drain(&mut ctx));
        assert_eq!(
            buttons,
            vec![
                (10, codes::BTN_RIGHT as u32, ButtonState::Pressed),
                (50, codes::BTN_RIGHT as u32, ButtonState::Released),
            ]
        );
    }

    #[test]
    fn softbutton_region_locks_at_press() {
        // property 6: the region is fixed at press time, motion cannot move it
        let (mut ctx, opener) = context();
        ctx.add_device(touchpad_info("event4")).unwrap();
        drain(&mut ctx);
        opener.push("event4", &touch_down(0, 0, 1800, 1260));
        opener.push(
            "event4",
            &[
                EvdevEvent::key(10, codes::BTN_LEFT, true),
                EvdevEvent::syn(10),
            ],
        );
        // wander into the left third while holding
        for step in 1..=20 {
            opener.push("event4", &touch_move(10 + step as u64, 0, 1800 - step * 70, 1260));
        }
        opener.push(
            "event4",
            &[
                EvdevEvent::key(100, codes::BTN_LEFT, false),
                EvdevEvent::syn(100),
            ],
        );
        ctx.set_now(200);
        ctx.dispatch().unwrap();
        let buttons = button_events(&drain(&mut ctx));
        assert_eq!(buttons.first().map(|b| b.1), Some(codes::BTN_RIGHT as u32));
        assert_eq!(buttons.last().map(|b| b.1), Some(codes::BTN_RIGHT as u32));
    }

    #[test]
    fn palm_touch_is_silent_for_life() {
        // S5: a touch starting in the lateral strip never produces events
        let (mut ctx, opener) = context();
        tap_touchpad(&mut ctx, &opener);
        opener.push("event4", &touch_down(0, 0, 1980, 700));
        for step in 1..=5 {
            opener.push("event4", &touch_move(step as u64 * 10, 0, 1980, 700 + step * 56));
        }
        opener.push("event4", &touch_up(60, 0));
        ctx.set_now(600);
        ctx.dispatch().unwrap();
        assert!(
            drain(&mut ctx).is_empty(),
            "palm produced events"
        );
    }

    #[test]
    fn two_finger_scroll_sums_to_travel() {
        // property 4: vertical scroll values sum to the finger travel
        let (mut ctx, opener) = context();
        ctx.add_device(touchpad_info("event4")).unwrap();
        drain(&mut ctx);
        opener.push("event4", &touch_down(0, 0, 800, 400));
        opener.push("event4", &touch_down(5, 1, 1200, 400));
        for step in 1..=10 {
            let t = 10 + step as u64 * 10;
            opener.push(
                "event4",
                &[
                    EvdevEvent::abs(t, codes::ABS_MT_SLOT, 0),
                    EvdevEvent::abs(t, codes::ABS_MT_POSITION_Y, 400 + step * 30),
                    EvdevEvent::abs(t, codes::ABS_MT_SLOT, 1),
                    EvdevEvent::abs(t, codes::ABS_MT_POSITION_Y, 400 + step * 30),
                    EvdevEvent::syn(t),
                ],
            );
        }
        opener.push("event4", &touch_up(150, 0));
        opener.push("event4", &touch_up(151, 1));
        ctx.set_now(600);
        ctx.dispatch().unwrap();
        let events = drain(&mut ctx);
        let scrolls: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                Event::PointerAxis { event } if event.axis == Axis::Vertical => {
                    assert_eq!(event.source, AxisSource::Finger);
                    Some(event.value)
                }
                _ => None,
            })
            .collect();
        let total: f64 = scrolls.iter().sum();
        // 300 units at 20 units/mm = 15mm of travel
        assert!((total - 15.0).abs() <= 2.0, "scroll sum {total}");
        assert_eq!(
            scrolls.iter().filter(|v| **v == 0.0).count(),
            1,
            "exactly one scroll stop: {scrolls:?}"
        );
        assert_eq!(scrolls.last(), Some(&0.0));
    }

    #[test]
    fn keyboard_mutes_fresh_touches_only() {
        let (mut ctx, opener) = context();
        ctx.add_device(touchpad_info("event4")).unwrap();
        ctx.add_device(DeviceInfo::keyboard("event0", "kbd")).unwrap();
        drain(&mut ctx);

        // a touch already in motion before typing keeps producing
        opener.push("event4", &touch_down(0, 0, 1000, 700));
        for step in 1..=5 {
            opener.push("event4", &touch_move(step as u64 * 10, 0, 1000 + step * 40, 700));
        }
        ctx.set_now(60);
        ctx.dispatch().unwrap();
        let before = drain(&mut ctx);
        assert!(before.iter().any(|e| matches!(e, Event::PointerMotion { .. })));

        opener.push(
            "event0",
            &[
                EvdevEvent::key(100, codes::KEY_A, true),
                EvdevEvent::syn(100),
            ],
        );
        ctx.set_now(101);
        ctx.dispatch().unwrap();

        // existing touch continues
        for step in 6..=10 {
            opener.push("event4", &touch_move(100 + step as u64, 0, 1000 + step * 40, 700));
        }
        ctx.set_now(115);
        ctx.dispatch().unwrap();
        let during = drain(&mut ctx);
        assert!(
            during
                .iter()
                .any(|e| matches!(e, Event::PointerMotion { .. })),
            "pre-typing touch was muted mid-stroke"
        );

        // a fresh touch inside the window is muted for its whole life
        opener.push("event4", &touch_up(120, 0));
        opener.push("event4", &touch_down(130, 1, 1000, 700));
        for step in 1..=10 {
            opener.push("event4", &touch_move(130 + step as u64, 1, 1000 + step * 40, 700));
        }
        opener.push("event4", &touch_up(300, 1));
        ctx.set_now(301);
        ctx.dispatch().unwrap();
        let muted = drain(&mut ctx);
        assert!(
            !muted.iter().any(|e| matches!(e, Event::PointerMotion { .. })),
            "typing-window touch produced motion"
        );
    }

    #[test]
    fn seat_key_counter_spans_devices() {
        // property 1: the counter is seat-wide, not per-device
        let (mut ctx, opener) = context();
        ctx.add_device(DeviceInfo::keyboard("event0", "kbd0")).unwrap();
        ctx.add_device(DeviceInfo::keyboard("event1", "kbd1")).unwrap();
        drain(&mut ctx);
        opener.push("event0", &[EvdevEvent::key(0, codes::KEY_A, true), EvdevEvent::syn(0)]);
        opener.push("event1", &[EvdevEvent::key(10, codes::KEY_A, true), EvdevEvent::syn(10)]);
        opener.push("event0", &[EvdevEvent::key(20, codes::KEY_A, false), EvdevEvent::syn(20)]);
        opener.push("event1", &[EvdevEvent::key(30, codes::KEY_A, false), EvdevEvent::syn(30)]);
        ctx.set_now(50);
        ctx.dispatch().unwrap();
        let counts: Vec<u32> = drain(&mut ctx)
            .iter()
            .filter_map(|e| match e {
                Event::Keyboard { event } => Some(event.seat_key_count),
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![1, 2, 1, 0]);
    }

    #[test]
    fn touch_seat_slots_are_dense_and_stable() {
        // property 2: (slot, seat-slot) constant per touch, no duplicates
        let (mut ctx, opener) = context();
        ctx.add_device(DeviceInfo::touchscreen(
            "event7",
            "screen",
            AbsInfo::new(0, 4000, 10),
            AbsInfo::new(0, 3000, 10),
            4,
        ))
        .unwrap();
        drain(&mut ctx);
        opener.push("event7", &touch_down(0, 0, 100, 100));
        opener.push("event7", &touch_down(5, 1, 500, 500));
        opener.push("event7", &touch_up(20, 0));
        opener.push("event7", &touch_down(30, 2, 900, 900));
        opener.push("event7", &touch_up(40, 1));
        opener.push("event7", &touch_up(50, 2));
        ctx.set_now(60);
        ctx.dispatch().unwrap();
        let events = drain(&mut ctx);

        let mut active: HashMap<u32, u32> = HashMap::new();
        let mut seen_seat_slots: HashSet<u32> = HashSet::new();
        for event in &events {
            match event {
                Event::TouchDown { event } => {
                    assert!(
                        !seen_seat_slots.contains(&event.seat_slot),
                        "seat slot {} already active",
                        event.seat_slot
                    );
                    seen_seat_slots.insert(event.seat_slot);
                    active.insert(event.slot, event.seat_slot);
                }
                Event::TouchUp { event } => {
                    assert_eq!(active.remove(&event.slot), Some(event.seat_slot));
                    seen_seat_slots.remove(&event.seat_slot);
                }
                _ => {}
            }
        }
        assert!(active.is_empty());
    }

    #[test]
    fn mouse_tool_tilt_becomes_rotation() {
        // S6: mouse tool with tilt (0, 1) reports rotation 355 degrees
        let (mut ctx, opener) = context();
        ctx.add_device(
            DeviceInfo::tablet(
                "event9",
                "tablet",
                AbsInfo::new(0, 10000, 100),
                AbsInfo::new(0, 8000, 100),
            )
            .with_abs(codes::ABS_TILT_X, AbsInfo::new(-90, 90, 0))
            .with_abs(codes::ABS_TILT_Y, AbsInfo::new(-90, 90, 0)),
        )
        .unwrap();
        drain(&mut ctx);
        opener.push(
            "event9",
            &[
                EvdevEvent::key(0, codes::BTN_TOOL_MOUSE, true),
                EvdevEvent::abs(0, codes::ABS_TILT_X, 0),
                EvdevEvent::abs(0, codes::ABS_TILT_Y, 90),
                EvdevEvent::syn(0),
            ],
        );
        ctx.set_now(10);
        ctx.dispatch().unwrap();
        let events = drain(&mut ctx);
        let prox = events
            .iter()
            .find_map(|e| match e {
                Event::TabletToolProximity { event } => Some(event),
                _ => None,
            })
            .expect("proximity event");
        assert_eq!(prox.state, ProximityState::In);
        assert!(
            (prox.axes.rotation - 355.0).abs() < 1e-6,
            "rotation {}",
            prox.axes.rotation
        );
    }

    #[test]
    fn tablet_proximity_closes_over_buttons() {
        // property 7: button releases precede the proximity-out
        let (mut ctx, opener) = context();
        ctx.add_device(DeviceInfo::tablet(
            "event9",
            "tablet",
            AbsInfo::new(0, 10000, 100),
            AbsInfo::new(0, 8000, 100),
        ))
        .unwrap();
        drain(&mut ctx);
        opener.push(
            "event9",
            &[
                EvdevEvent::key(0, codes::BTN_TOOL_PEN, true),
                EvdevEvent::abs(0, codes::ABS_X, 5000),
                EvdevEvent::abs(0, codes::ABS_Y, 4000),
                EvdevEvent::msc(0, codes::MSC_SERIAL, 1234),
                EvdevEvent::syn(0),
            ],
        );
        opener.push(
            "event9",
            &[
                EvdevEvent::key(10, codes::BTN_STYLUS, true),
                EvdevEvent::syn(10),
            ],
        );
        // the pen leaves with the button still held
        opener.push(
            "event9",
            &[
                EvdevEvent::key(20, codes::BTN_TOOL_PEN, false),
                EvdevEvent::syn(20),
            ],
        );
        ctx.set_now(30);
        ctx.dispatch().unwrap();
        let events = drain(&mut ctx);

        let mut saw_press = false;
        let mut saw_release = false;
        let mut prox_out_at = None;
        for (idx, event) in events.iter().enumerate() {
            match event {
                Event::TabletToolButton { event } => {
                    match event.state {
                        ButtonState::Pressed => saw_press = true,
                        ButtonState::Released => {
                            saw_release = true;
                            assert!(prox_out_at.is_none(), "release after prox-out");
                        }
                    }
                }
                Event::TabletToolProximity { event } if event.state == ProximityState::Out => {
                    prox_out_at = Some(idx);
                }
                _ => {}
            }
        }
        assert!(saw_press && saw_release && prox_out_at.is_some());
    }

    #[test]
    fn serial_tool_is_shared_across_tablets() {
        let (mut ctx, opener) = context();
        for sysname in ["event9", "event10"] {
            ctx.add_device(DeviceInfo::tablet(
                sysname,
                "tablet",
                AbsInfo::new(0, 10000, 100),
                AbsInfo::new(0, 8000, 100),
            ))
            .unwrap();
        }
        drain(&mut ctx);
        for (time, sysname) in [(0u64, "event9"), (100, "event10")] {
            opener.push(
                sysname,
                &[
                    EvdevEvent::key(time, codes::BTN_TOOL_PEN, true),
                    EvdevEvent::msc(time, codes::MSC_SERIAL, 4242),
                    EvdevEvent::syn(time),
                ],
            );
            opener.push(
                sysname,
                &[
                    EvdevEvent::key(time + 10, codes::BTN_TOOL_PEN, false),
                    EvdevEvent::syn(time + 10),
                ],
            );
        }
        ctx.set_now(200);
        ctx.dispatch().unwrap();
        let tools: Vec<_> = drain(&mut ctx)
            .iter()
            .filter_map(|e| match e {
                Event::TabletToolProximity { event } if event.state == ProximityState::In => {
                    Some(event.tool.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0], tools[1], "same pen should be the same tool");
        assert_eq!(tools[0].serial(), 4242);
    }

    #[test]
    fn ring_wrap_scrolls_forward() {
        // S7: 0.95 -> 0.05 across north is a +0.1 delta
        let (mut ctx, opener) = context();
        ctx.add_device(DeviceInfo::buttonset(
            "event11",
            "pad",
            ButtonsetInfo {
                rings: 1,
                strips: 0,
                ring_resolution: Some(72),
                buttons: vec![codes::BTN_0, codes::BTN_1],
            },
        ))
        .unwrap();
        drain(&mut ctx);
        opener.push(
            "event11",
            &[EvdevEvent::abs(0, codes::ABS_WHEEL, 68), EvdevEvent::syn(0)],
        );
        opener.push(
            "event11",
            &[EvdevEvent::abs(10, codes::ABS_WHEEL, 4), EvdevEvent::syn(10)],
        );
        ctx.set_now(20);
        ctx.dispatch().unwrap();
        let deltas: Vec<f64> = drain(&mut ctx)
            .iter()
            .filter_map(|e| match e {
                Event::ButtonsetAxis { event } => Some(event.delta),
                _ => None,
            })
            .collect();
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0], 0.0);
        assert!(
            (deltas[1] - 8.0 / 72.0).abs() < 1e-9,
            "wrap delta {}",
            deltas[1]
        );
    }

    #[test]
    fn halfkey_rewrites_through_the_pipeline() {
        let (mut ctx, opener) = context();
        let kbd = ctx.add_device(DeviceInfo::keyboard("event0", "kbd")).unwrap();
        drain(&mut ctx);
        kbd.config_halfkey_set_enabled(true);
        opener.push(
            "event0",
            &[
                EvdevEvent::key(0, codes::KEY_SPACE, true),
                EvdevEvent::syn(0),
                EvdevEvent::key(10, codes::KEY_J, true),
                EvdevEvent::syn(10),
                EvdevEvent::key(20, codes::KEY_J, false),
                EvdevEvent::syn(20),
                EvdevEvent::key(30, codes::KEY_SPACE, false),
                EvdevEvent::syn(30),
            ],
        );
        ctx.set_now(40);
        ctx.dispatch().unwrap();
        let keys: Vec<(u32, KeyState)> = drain(&mut ctx)
            .iter()
            .filter_map(|e| match e {
                Event::Keyboard { event } => Some((event.code, event.state)),
                _ => None,
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                (codes::KEY_F as u32, KeyState::Pressed),
                (codes::KEY_F as u32, KeyState::Released),
            ]
        );
    }

    #[test]
    fn device_gone_releases_buttons_before_removal() {
        let (mut ctx, opener) = context();
        ctx.add_device(DeviceInfo::pointer("event2", "mouse")).unwrap();
        drain(&mut ctx);
        opener.push(
            "event2",
            &[EvdevEvent::key(0, codes::BTN_LEFT, true), EvdevEvent::syn(0)],
        );
        ctx.set_now(10);
        ctx.dispatch().unwrap();
        drain(&mut ctx);

        opener.set_gone("event2");
        ctx.set_now(20);
        ctx.dispatch().unwrap();
        let events = drain(&mut ctx);
        let release_idx = events.iter().position(|e| {
            matches!(e, Event::PointerButton { event } if event.state == ButtonState::Released)
        });
        let removed_idx = events
            .iter()
            .position(|e| matches!(e, Event::DeviceRemoved { .. }));
        assert!(release_idx.is_some(), "no release: {events:?}");
        assert!(removed_idx.is_some());
        assert!(release_idx < removed_idx);
    }

    #[test]
    fn suspend_resume_cycles_devices() {
        let (mut ctx, opener) = context();
        ctx.add_device(DeviceInfo::keyboard("event0", "kbd")).unwrap();
        ctx.add_device(DeviceInfo::pointer("event2", "mouse")).unwrap();
        drain(&mut ctx);

        ctx.suspend();
        let removed = drain(&mut ctx);
        assert_eq!(
            removed
                .iter()
                .filter(|e| matches!(e, Event::DeviceRemoved { .. }))
                .count(),
            2
        );

        // one device fails to reopen and is silently dropped
        opener.fail("event2");
        ctx.resume();
        let resumed = drain(&mut ctx);
        let added: Vec<&str> = resumed
            .iter()
            .filter_map(|e| match e {
                Event::DeviceAdded { device } => Some(device.sysname()),
                _ => None,
            })
            .collect();
        assert_eq!(added, vec!["event0"]);
    }

    #[test]
    fn send_events_disabled_mutes_device() {
        let (mut ctx, opener) = context();
        let mouse = ctx.add_device(DeviceInfo::pointer("event2", "mouse")).unwrap();
        drain(&mut ctx);
        mouse.config_send_events_set_mode(SendEventsMode::Disabled);
        opener.push(
            "event2",
            &[
                EvdevEvent::rel(0, codes::REL_X, 10),
                EvdevEvent::rel(0, codes::REL_Y, 5),
                EvdevEvent::syn(0),
            ],
        );
        ctx.set_now(10);
        ctx.dispatch().unwrap();
        assert!(drain(&mut ctx).is_empty());

        mouse.config_send_events_set_mode(SendEventsMode::Enabled);
        opener.push(
            "event2",
            &[
                EvdevEvent::rel(20, codes::REL_X, 10),
                EvdevEvent::syn(20),
            ],
        );
        ctx.set_now(30);
        ctx.dispatch().unwrap();
        assert!(drain(&mut ctx)
            .iter()
            .any(|e| matches!(e, Event::PointerMotion { .. })));
    }

    #[test]
    fn reseating_emits_remove_before_add() {
        let (mut ctx, _opener) = context();
        let kbd = ctx.add_device(DeviceInfo::keyboard("event0", "kbd")).unwrap();
        drain(&mut ctx);
        let new_kbd = ctx.set_seat_logical_name(&kbd, "gaming").unwrap();
        let events = drain(&mut ctx);
        assert!(matches!(&events[0], Event::DeviceRemoved { device } if *device == kbd));
        assert!(matches!(&events[1], Event::DeviceAdded { device } if *device == new_kbd));
        assert!(!kbd.alive());
        assert_eq!(kbd.sysname(), "event0");
        assert_eq!(new_kbd.seat().logical_name(), "gaming");
        assert_ne!(kbd, new_kbd);
    }

    #[test]
    fn clickfinger_counts_fingers() {
        let (mut ctx, opener) = context();
        let pad = ctx.add_device(touchpad_info("event4")).unwrap();
        drain(&mut ctx);
        assert_eq!(
            pad.config_click_set_method(ClickMethod::Clickfinger),
            crate::device::ConfigStatus::Success
        );
        opener.push("event4", &touch_down(0, 0, 800, 700));
        opener.push("event4", &touch_down(5, 1, 1200, 700));
        opener.push(
            "event4",
            &[EvdevEvent::key(10, codes::BTN_LEFT, true), EvdevEvent::syn(10)],
        );
        opener.push(
            "event4",
            &[EvdevEvent::key(50, codes::BTN_LEFT, false), EvdevEvent::syn(50)],
        );
        ctx.set_now(100);
        ctx.dispatch().unwrap();
        let buttons = button_events(&drain(&mut ctx));
        assert_eq!(
            buttons,
            vec![
                (10, codes::BTN_RIGHT as u32, ButtonState::Pressed),
                (50, codes::BTN_RIGHT as u32, ButtonState::Released),
            ]
        );
    }

    #[test]
    fn edge_scroll_activates_after_dwell() {
        let (mut ctx, opener) = context();
        let pad = ctx.add_device(touchpad_info("event4")).unwrap();
        drain(&mut ctx);
        assert_eq!(
            pad.config_scroll_set_method(ScrollMethod::Edge),
            crate::device::ConfigStatus::Success
        );
        // land in the right strip, dwell past the activation timeout, slide down
        opener.push("event4", &touch_down(0, 0, 1950, 400));
        ctx.set_now(350);
        ctx.dispatch().unwrap();
        drain(&mut ctx);
        for step in 1..=10 {
            opener.push(
                "event4",
                &touch_move(360 + step as u64 * 10, 0, 1950, 400 + step * 40),
            );
        }
        opener.push("event4", &touch_up(500, 0));
        ctx.set_now(600);
        ctx.dispatch().unwrap();
        let events = drain(&mut ctx);
        let scrolls: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                Event::PointerAxis { event } if event.axis == Axis::Vertical => Some(event.value),
                _ => None,
            })
            .collect();
        assert!(!scrolls.is_empty(), "no edge scroll events: {events:?}");
        let total: f64 = scrolls.iter().sum();
        // 400 units at 20 units/mm
        assert!((total - 20.0).abs() <= 2.0, "scroll sum {total}");
        assert_eq!(scrolls.last(), Some(&0.0), "missing scroll stop");
        assert!(
            !events.iter().any(|e| matches!(e, Event::PointerMotion { .. })),
            "edge scroll finger moved the pointer"
        );
    }

    #[test]
    fn middle_button_emulation_pairs_left_and_right() {
        let (mut ctx, opener) = context();
        let mouse = ctx.add_device(DeviceInfo::pointer("event2", "mouse")).unwrap();
        drain(&mut ctx);
        mouse.config_middle_emulation_set_enabled(true);
        opener.push(
            "event2",
            &[EvdevEvent::key(0, codes::BTN_LEFT, true), EvdevEvent::syn(0)],
        );
        opener.push(
            "event2",
            &[EvdevEvent::key(20, codes::BTN_RIGHT, true), EvdevEvent::syn(20)],
        );
        opener.push(
            "event2",
            &[EvdevEvent::key(100, codes::BTN_LEFT, false), EvdevEvent::syn(100)],
        );
        opener.push(
            "event2",
            &[EvdevEvent::key(110, codes::BTN_RIGHT, false), EvdevEvent::syn(110)],
        );
        ctx.set_now(200);
        ctx.dispatch().unwrap();
        let buttons = button_events(&drain(&mut ctx));
        assert_eq!(
            buttons,
            vec![
                (20, codes::BTN_MIDDLE as u32, ButtonState::Pressed),
                (100, codes::BTN_MIDDLE as u32, ButtonState::Released),
            ]
        );
    }

    #[test]
    fn middle_button_emulation_times_out_to_plain_press() {
        let (mut ctx, opener) = context();
        let mouse = ctx.add_device(DeviceInfo::pointer("event2", "mouse")).unwrap();
        drain(&mut ctx);
        mouse.config_middle_emulation_set_enabled(true);
        opener.push(
            "event2",
            &[EvdevEvent::key(0, codes::BTN_LEFT, true), EvdevEvent::syn(0)],
        );
        ctx.set_now(200);
        ctx.dispatch().unwrap();
        let buttons = button_events(&drain(&mut ctx));
        // the partner never arrived; the press surfaces at the timeout
        assert_eq!(
            buttons,
            vec![(50, codes::BTN_LEFT as u32, ButtonState::Pressed)]
        );
        opener.push(
            "event2",
            &[EvdevEvent::key(300, codes::BTN_LEFT, false), EvdevEvent::syn(300)],
        );
        ctx.set_now(310);
        ctx.dispatch().unwrap();
        let buttons = button_events(&drain(&mut ctx));
        assert_eq!(
            buttons,
            vec![(300, codes::BTN_LEFT as u32, ButtonState::Released)]
        );
    }

    #[test]
    fn button_scroll_converts_motion_and_replays_clicks() {
        let (mut ctx, opener) = context();
        let mouse = ctx.add_device(DeviceInfo::pointer("event2", "trackpoint")).unwrap();
        drain(&mut ctx);
        assert_eq!(
            mouse.config_scroll_set_method(ScrollMethod::OnButtonDown),
            crate::device::ConfigStatus::Success
        );

        // held past the timeout, motion scrolls instead of moving
        opener.push(
            "event2",
            &[EvdevEvent::key(0, codes::BTN_MIDDLE, true), EvdevEvent::syn(0)],
        );
        ctx.set_now(250);
        ctx.dispatch().unwrap();
        for t in [260u64, 270, 280] {
            opener.push(
                "event2",
                &[EvdevEvent::rel(t, codes::REL_Y, 10), EvdevEvent::syn(t)],
            );
        }
        opener.push(
            "event2",
            &[EvdevEvent::key(400, codes::BTN_MIDDLE, false), EvdevEvent::syn(400)],
        );
        ctx.set_now(500);
        ctx.dispatch().unwrap();
        let events = drain(&mut ctx);
        assert!(button_events(&events).is_empty(), "scroll hold leaked a click");
        assert!(!events.iter().any(|e| matches!(e, Event::PointerMotion { .. })));
        let scrolls: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                Event::PointerAxis { event } => {
                    assert_eq!(event.source, AxisSource::Continuous);
                    Some(event.value)
                }
                _ => None,
            })
            .collect();
        assert_eq!(scrolls, vec![10.0, 10.0, 10.0, 0.0]);

        // a quick press without motion replays as a click
        opener.push(
            "event2",
            &[EvdevEvent::key(600, codes::BTN_MIDDLE, true), EvdevEvent::syn(600)],
        );
        opener.push(
            "event2",
            &[EvdevEvent::key(620, codes::BTN_MIDDLE, false), EvdevEvent::syn(620)],
        );
        ctx.set_now(700);
        ctx.dispatch().unwrap();
        let buttons = button_events(&drain(&mut ctx));
        assert_eq!(
            buttons,
            vec![
                (620, codes::BTN_MIDDLE as u32, ButtonState::Pressed),
                (620, codes::BTN_MIDDLE as u32, ButtonState::Released),
            ]
        );
    }

    #[test]
    fn natural_scroll_inverts_wheel_values() {
        let (mut ctx, opener) = context();
        let mouse = ctx.add_device(DeviceInfo::pointer("event2", "mouse")).unwrap();
        drain(&mut ctx);
        opener.push(
            "event2",
            &[EvdevEvent::rel(0, codes::REL_WHEEL, 1), EvdevEvent::syn(0)],
        );
        ctx.set_now(10);
        ctx.dispatch().unwrap();
        let first: Vec<f64> = drain(&mut ctx)
            .iter()
            .filter_map(|e| match e {
                Event::PointerAxis { event } => Some(event.value),
                _ => None,
            })
            .collect();
        assert_eq!(first, vec![-15.0]);

        mouse.config_natural_scroll_set_enabled(true);
        opener.push(
            "event2",
            &[EvdevEvent::rel(20, codes::REL_WHEEL, 1), EvdevEvent::syn(20)],
        );
        ctx.set_now(30);
        ctx.dispatch().unwrap();
        let second: Vec<f64> = drain(&mut ctx)
            .iter()
            .filter_map(|e| match e {
                Event::PointerAxis { event } => Some(event.value),
                _ => None,
            })
            .collect();
        assert_eq!(second, vec![15.0]);
    }

    #[test]
    fn left_handed_swaps_physical_pointer_buttons() {
        let (mut ctx, opener) = context();
        let mouse = ctx.add_device(DeviceInfo::pointer("event2", "mouse")).unwrap();
        drain(&mut ctx);
        mouse.config_left_handed_set(true);
        opener.push(
            "event2",
            &[EvdevEvent::key(0, codes::BTN_LEFT, true), EvdevEvent::syn(0)],
        );
        opener.push(
            "event2",
            &[EvdevEvent::key(20, codes::BTN_LEFT, false), EvdevEvent::syn(20)],
        );
        ctx.set_now(30);
        ctx.dispatch().unwrap();
        let buttons = button_events(&drain(&mut ctx));
        assert_eq!(
            buttons,
            vec![
                (0, codes::BTN_RIGHT as u32, ButtonState::Pressed),
                (20, codes::BTN_RIGHT as u32, ButtonState::Released),
            ]
        );
        assert!(mouse.config_left_handed());
    }

    #[test]
    fn absolute_pointer_reports_transformable_position() {
        let (mut ctx, opener) = context();
        ctx.add_device(
            DeviceInfo::pointer("event3", "abs pointer")
                .with_abs(codes::ABS_X, AbsInfo::new(0, 4000, 0))
                .with_abs(codes::ABS_Y, AbsInfo::new(0, 3000, 0)),
        )
        .unwrap();
        drain(&mut ctx);
        opener.push(
            "event3",
            &[
                EvdevEvent::abs(0, codes::ABS_X, 2000),
                EvdevEvent::abs(0, codes::ABS_Y, 750),
                EvdevEvent::syn(0),
            ],
        );
        ctx.set_now(10);
        ctx.dispatch().unwrap();
        let events = drain(&mut ctx);
        let abs = events
            .iter()
            .find_map(|e| match e {
                Event::PointerMotionAbsolute { event } => Some(event),
                _ => None,
            })
            .expect("absolute motion event");
        assert_eq!(abs.x, 2000.0);
        assert_eq!(abs.x_transformed(800), 400.0);
        assert_eq!(abs.y_transformed(600), 150.0);
    }

    #[test]
    fn touchscreen_calibration_applies_to_coordinates() {
        let (mut ctx, opener) = context();
        let screen = ctx
            .add_device(DeviceInfo::touchscreen(
                "event7",
                "screen",
                AbsInfo::new(0, 1000, 0),
                AbsInfo::new(0, 1000, 0),
                2,
            ))
            .unwrap();
        drain(&mut ctx);
        // mirror horizontally: x' = 1 - x
        assert_eq!(
            screen.config_calibration_set_matrix([-1.0, 0.0, 1.0, 0.0, 1.0, 0.0]),
            crate::device::ConfigStatus::Success
        );
        opener.push("event7", &touch_down(0, 0, 200, 500));
        ctx.set_now(10);
        ctx.dispatch().unwrap();
        let down = drain(&mut ctx)
            .iter()
            .find_map(|e| match e {
                Event::TouchDown { event } => Some((event.x, event.y)),
                _ => None,
            })
            .expect("touch down");
        assert_eq!(down, (800.0, 500.0));
    }

    #[test]
    fn hovering_finger_does_not_move_or_tap() {
        let (mut ctx, opener) = context();
        let pad = ctx
            .add_device(
                touchpad_info("event4")
                    .with_abs(codes::ABS_MT_PRESSURE, AbsInfo::new(0, 255, 0)),
            )
            .unwrap();
        drain(&mut ctx);
        pad.config_tap_set_enabled(true);

        // finger tracked below the contact pressure: no motion, no tap
        opener.push(
            "event4",
            &[
                EvdevEvent::abs(0, codes::ABS_MT_SLOT, 0),
                EvdevEvent::abs(0, codes::ABS_MT_TRACKING_ID, 7),
                EvdevEvent::abs(0, codes::ABS_MT_POSITION_X, 1000),
                EvdevEvent::abs(0, codes::ABS_MT_POSITION_Y, 700),
                EvdevEvent::abs(0, codes::ABS_MT_PRESSURE, 2),
                EvdevEvent::syn(0),
            ],
        );
        for step in 1..=5 {
            opener.push(
                "event4",
                &[
                    EvdevEvent::abs(step, codes::ABS_MT_SLOT, 0),
                    EvdevEvent::abs(step, codes::ABS_MT_POSITION_X, 1000 + step as i32 * 40),
                    EvdevEvent::syn(step),
                ],
            );
        }
        ctx.set_now(10);
        ctx.dispatch().unwrap();
        assert!(drain(&mut ctx).is_empty(), "hover produced events");

        // pressing down makes it a contact; motion flows from there
        opener.push(
            "event4",
            &[
                EvdevEvent::abs(20, codes::ABS_MT_SLOT, 0),
                EvdevEvent::abs(20, codes::ABS_MT_PRESSURE, 40),
                EvdevEvent::syn(20),
            ],
        );
        for step in 1..=5 {
            let t = 20 + step as u64;
            opener.push(
                "event4",
                &[
                    EvdevEvent::abs(t, codes::ABS_MT_SLOT, 0),
                    EvdevEvent::abs(t, codes::ABS_MT_POSITION_X, 1200 + step as i32 * 40),
                    EvdevEvent::syn(t),
                ],
            );
        }
        ctx.set_now(600);
        ctx.dispatch().unwrap();
        let events = drain(&mut ctx);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::PointerMotion { .. })));
    }

    #[test]
    fn tablet_pressure_suppresses_distance() {
        let (mut ctx, opener) = context();
        ctx.add_device(
            DeviceInfo::tablet(
                "event9",
                "tablet",
                AbsInfo::new(0, 10000, 100),
                AbsInfo::new(0, 8000, 100),
            )
            .with_abs(codes::ABS_PRESSURE, AbsInfo::new(0, 100, 0))
            .with_abs(codes::ABS_DISTANCE, AbsInfo::new(0, 100, 0)),
        )
        .unwrap();
        drain(&mut ctx);
        opener.push(
            "event9",
            &[
                EvdevEvent::key(0, codes::BTN_TOOL_PEN, true),
                EvdevEvent::abs(0, codes::ABS_X, 5000),
                EvdevEvent::abs(0, codes::ABS_Y, 4000),
                EvdevEvent::abs(0, codes::ABS_DISTANCE, 50),
                EvdevEvent::syn(0),
            ],
        );
        // the pen presses down while the tablet still reports a distance
        opener.push(
            "event9",
            &[
                EvdevEvent::abs(10, codes::ABS_PRESSURE, 60),
                EvdevEvent::abs(10, codes::ABS_DISTANCE, 20),
                EvdevEvent::syn(10),
            ],
        );
        ctx.set_now(20);
        ctx.dispatch().unwrap();
        let axis = drain(&mut ctx)
            .iter()
            .find_map(|e| match e {
                Event::TabletToolAxis { event } => Some(event.clone()),
                _ => None,
            })
            .expect("axis event");
        assert!(axis.changed.contains(crate::event::tablet::AxisMask::PRESSURE));
        assert!(!axis.changed.contains(crate::event::tablet::AxisMask::DISTANCE));
        assert_eq!(axis.axes.distance, 0.0);
        assert!((axis.axes.pressure - 0.6).abs() < 1e-9);
    }

    #[test]
    fn tablet_pressure_clamps_to_zero_once() {
        let (mut ctx, opener) = context();
        ctx.add_device(
            DeviceInfo::tablet(
                "event9",
                "tablet",
                AbsInfo::new(0, 10000, 100),
                AbsInfo::new(0, 8000, 100),
            )
            .with_abs(codes::ABS_PRESSURE, AbsInfo::new(0, 100, 0)),
        )
        .unwrap();
        drain(&mut ctx);
        opener.push(
            "event9",
            &[
                EvdevEvent::key(0, codes::BTN_TOOL_PEN, true),
                EvdevEvent::abs(0, codes::ABS_X, 5000),
                EvdevEvent::abs(0, codes::ABS_PRESSURE, 10),
                EvdevEvent::syn(0),
            ],
        );
        // hovering now: pressure decays to zero, then keeps reporting zero
        opener.push(
            "event9",
            &[EvdevEvent::abs(10, codes::ABS_PRESSURE, 0), EvdevEvent::syn(10)],
        );
        opener.push(
            "event9",
            &[EvdevEvent::abs(20, codes::ABS_PRESSURE, 0), EvdevEvent::syn(20)],
        );
        ctx.set_now(30);
        ctx.dispatch().unwrap();
        let axes: Vec<_> = drain(&mut ctx)
            .iter()
            .filter_map(|e| match e {
                Event::TabletToolAxis { event } => Some(event.axes.pressure),
                _ => None,
            })
            .collect();
        // the clamp to exactly zero is emitted once, then stays silent
        assert_eq!(axes, vec![0.0]);
    }

    #[test]
    fn tablet_left_handed_waits_for_prox_out() {
        let (mut ctx, opener) = context();
        let tablet = ctx
            .add_device(DeviceInfo::tablet(
                "event9",
                "tablet",
                AbsInfo::new(0, 10000, 100),
                AbsInfo::new(0, 8000, 100),
            ))
            .unwrap();
        drain(&mut ctx);
        opener.push(
            "event9",
            &[
                EvdevEvent::key(0, codes::BTN_TOOL_PEN, true),
                EvdevEvent::abs(0, codes::ABS_X, 1000),
                EvdevEvent::abs(0, codes::ABS_Y, 1000),
                EvdevEvent::syn(0),
            ],
        );
        ctx.set_now(5);
        ctx.dispatch().unwrap();
        drain(&mut ctx);

        tablet.config_left_handed_set(true);
        opener.push(
            "event9",
            &[EvdevEvent::abs(10, codes::ABS_X, 2000), EvdevEvent::syn(10)],
        );
        ctx.set_now(15);
        ctx.dispatch().unwrap();
        let mid = drain(&mut ctx)
            .iter()
            .find_map(|e| match e {
                Event::TabletToolAxis { event } => Some(event.axes.x),
                _ => None,
            })
            .expect("axis event");
        // still right-handed while the tool is in proximity
        assert_eq!(mid, 2000.0);
        assert!(!tablet.config_left_handed());

        opener.push(
            "event9",
            &[EvdevEvent::key(20, codes::BTN_TOOL_PEN, false), EvdevEvent::syn(20)],
        );
        opener.push(
            "event9",
            &[
                EvdevEvent::key(30, codes::BTN_TOOL_PEN, true),
                EvdevEvent::abs(30, codes::ABS_X, 2000),
                EvdevEvent::abs(30, codes::ABS_Y, 1000),
                EvdevEvent::syn(30),
            ],
        );
        ctx.set_now(40);
        ctx.dispatch().unwrap();
        let events = drain(&mut ctx);
        let prox_in = events
            .iter()
            .filter_map(|e| match e {
                Event::TabletToolProximity { event } if event.state == ProximityState::In => {
                    Some(event.axes.x)
                }
                _ => None,
            })
            .next()
            .expect("second prox-in");
        assert_eq!(prox_in, 8000.0);
        assert!(tablet.config_left_handed());
    }

    #[test]
    fn strip_release_is_suppressed_and_touch_restarts() {
        let (mut ctx, opener) = context();
        ctx.add_device(
            DeviceInfo::buttonset(
                "event11",
                "pad",
                ButtonsetInfo {
                    rings: 0,
                    strips: 1,
                    ring_resolution: None,
                    buttons: vec![],
                },
            )
            .with_abs(codes::ABS_RX, AbsInfo::new(0, 4096, 0)),
        )
        .unwrap();
        drain(&mut ctx);
        for (t, v) in [(0i32, 4096i32), (10, 64), (20, 0), (30, 1024)] {
            opener.push(
                "event11",
                &[EvdevEvent::abs(t as u64, codes::ABS_RX, v), EvdevEvent::syn(t as u64)],
            );
        }
        ctx.set_now(40);
        ctx.dispatch().unwrap();
        let strip: Vec<(f64, f64)> = drain(&mut ctx)
            .iter()
            .filter_map(|e| match e {
                Event::ButtonsetAxis { event } => Some((event.position, event.delta)),
                _ => None,
            })
            .collect();
        // three events: the zero reading emits nothing and resets the touch
        assert_eq!(strip.len(), 3);
        assert!((strip[0].0 - 1.0).abs() < 1e-9 && strip[0].1 == 0.0);
        assert!((strip[1].0 - 0.5).abs() < 1e-9 && (strip[1].1 + 0.5).abs() < 1e-9);
        assert!((strip[2].0 - 10.0 / 12.0).abs() < 1e-9 && strip[2].1 == 0.0);
    }

    #[test]
    fn ring_rotation_moves_logical_north() {
        let (mut ctx, opener) = context();
        let pad = ctx
            .add_device(DeviceInfo::buttonset(
                "event11",
                "pad",
                ButtonsetInfo {
                    rings: 1,
                    strips: 0,
                    ring_resolution: Some(72),
                    buttons: vec![],
                },
            ))
            .unwrap();
        drain(&mut ctx);
        assert_eq!(pad.config_rotation_set(90), crate::device::ConfigStatus::Success);
        opener.push(
            "event11",
            &[EvdevEvent::abs(0, codes::ABS_WHEEL, 0), EvdevEvent::syn(0)],
        );
        ctx.set_now(10);
        ctx.dispatch().unwrap();
        let position = drain(&mut ctx)
            .iter()
            .find_map(|e| match e {
                Event::ButtonsetAxis { event } => Some(event.position),
                _ => None,
            })
            .expect("ring event");
        // physical north reads as 270 degrees past the rotated logical north
        assert!((position - 0.75).abs() < 1e-9);
    }

    #[test]
    fn resting_thumb_neither_moves_nor_taps() {
        let (mut ctx, opener) = context();
        let pad = ctx
            .add_device(
                touchpad_info("event4")
                    .with_abs(codes::ABS_MT_PRESSURE, AbsInfo::new(0, 255, 0)),
            )
            .unwrap();
        drain(&mut ctx);
        pad.config_tap_set_enabled(true);
        opener.push(
            "event4",
            &[
                EvdevEvent::abs(0, codes::ABS_MT_SLOT, 0),
                EvdevEvent::abs(0, codes::ABS_MT_TRACKING_ID, 9),
                EvdevEvent::abs(0, codes::ABS_MT_POSITION_X, 1000),
                EvdevEvent::abs(0, codes::ABS_MT_POSITION_Y, 1300),
                EvdevEvent::abs(0, codes::ABS_MT_PRESSURE, 200),
                EvdevEvent::syn(0),
            ],
        );
        for step in 1..=5 {
            opener.push(
                "event4",
                &[
                    EvdevEvent::abs(step, codes::ABS_MT_SLOT, 0),
                    EvdevEvent::abs(step, codes::ABS_MT_POSITION_X, 1000 + step as i32 * 40),
                    EvdevEvent::syn(step),
                ],
            );
        }
        opener.push("event4", &touch_up(50, 0));
        ctx.set_now(600);
        ctx.dispatch().unwrap();
        assert!(drain(&mut ctx).is_empty(), "thumb produced events");
    }

    #[test]
    fn corner_palm_on_wide_pads() {
        // the pad is 100mm wide, so the top corners are palm territory too
        let (mut ctx, opener) = context();
        tap_touchpad(&mut ctx, &opener);
        opener.push("event4", &touch_down(0, 0, 1850, 100));
        for step in 1..=5 {
            opener.push("event4", &touch_move(step as u64 * 10, 0, 1850 - step * 20, 100));
        }
        opener.push("event4", &touch_up(60, 0));
        ctx.set_now(600);
        ctx.dispatch().unwrap();
        assert!(drain(&mut ctx).is_empty(), "corner palm produced events");
    }

    #[test]
    fn topbuttonpad_strip_is_geometric() {
        let (mut ctx, opener) = context();
        let mut info = touchpad_info("event4");
        info.quirks.topbuttonpad = true;
        info.quirks.trackpoint_attached = true;
        ctx.add_device(info).unwrap();
        drain(&mut ctx);
        // finger in the top-right strip third
        opener.push("event4", &touch_down(0, 0, 1800, 100));
        opener.push(
            "event4",
            &[EvdevEvent::key(10, codes::BTN_LEFT, true), EvdevEvent::syn(10)],
        );
        opener.push(
            "event4",
            &[EvdevEvent::key(40, codes::BTN_LEFT, false), EvdevEvent::syn(40)],
        );
        ctx.set_now(100);
        ctx.dispatch().unwrap();
        let buttons = button_events(&drain(&mut ctx));
        assert_eq!(
            buttons,
            vec![
                (10, codes::BTN_RIGHT as u32, ButtonState::Pressed),
                (40, codes::BTN_RIGHT as u32, ButtonState::Released),
            ]
        );
    }

    #[test]
    fn clickfinger_suppresses_four_finger_clicks() {
        let (mut ctx, opener) = context();
        let pad = ctx.add_device(touchpad_info("event4")).unwrap();
        drain(&mut ctx);
        pad.config_click_set_method(ClickMethod::Clickfinger);
        for (slot, x) in [(0, 600), (1, 900), (2, 1200), (3, 1500)] {
            opener.push("event4", &touch_down(slot as u64, slot, x, 700));
        }
        opener.push(
            "event4",
            &[EvdevEvent::key(10, codes::BTN_LEFT, true), EvdevEvent::syn(10)],
        );
        opener.push(
            "event4",
            &[EvdevEvent::key(50, codes::BTN_LEFT, false), EvdevEvent::syn(50)],
        );
        ctx.set_now(100);
        ctx.dispatch().unwrap();
        assert!(button_events(&drain(&mut ctx)).is_empty());
    }

    #[test]
    fn click_method_switch_completes_running_cycle() {
        let (mut ctx, opener) = context();
        let pad = ctx.add_device(touchpad_info("event4")).unwrap();
        drain(&mut ctx);
        // press under button-areas in the bottom-right region
        opener.push("event4", &touch_down(0, 0, 1800, 1260));
        opener.push(
            "event4",
            &[EvdevEvent::key(10, codes::BTN_LEFT, true), EvdevEvent::syn(10)],
        );
        ctx.set_now(20);
        ctx.dispatch().unwrap();
        drain(&mut ctx);

        // switching mid-press defers; the release still follows button-areas
        pad.config_click_set_method(ClickMethod::Clickfinger);
        opener.push(
            "event4",
            &[EvdevEvent::key(30, codes::BTN_LEFT, false), EvdevEvent::syn(30)],
        );
        // second click: one finger in the old right region is now a left click
        opener.push(
            "event4",
            &[EvdevEvent::key(60, codes::BTN_LEFT, true), EvdevEvent::syn(60)],
        );
        opener.push(
            "event4",
            &[EvdevEvent::key(90, codes::BTN_LEFT, false), EvdevEvent::syn(90)],
        );
        ctx.set_now(200);
        ctx.dispatch().unwrap();
        let buttons = button_events(&drain(&mut ctx));
        assert_eq!(
            buttons,
            vec![
                (30, codes::BTN_RIGHT as u32, ButtonState::Released),
                (60, codes::BTN_LEFT as u32, ButtonState::Pressed),
                (90, codes::BTN_LEFT as u32, ButtonState::Released),
            ]
        );
    }

    #[test]
    fn scroll_to_motion_handoff_waits() {
        let (mut ctx, opener) = context();
        ctx.add_device(touchpad_info("event4")).unwrap();
        drain(&mut ctx);
        opener.push("event4", &touch_down(0, 0, 800, 400));
        opener.push("event4", &touch_down(5, 1, 1200, 400));
        for step in 1..=4 {
            let t = 10 + step as u64 * 10;
            opener.push(
                "event4",
                &[
                    EvdevEvent::abs(t, codes::ABS_MT_SLOT, 0),
                    EvdevEvent::abs(t, codes::ABS_MT_POSITION_Y, 400 + step * 30),
                    EvdevEvent::abs(t, codes::ABS_MT_SLOT, 1),
                    EvdevEvent::abs(t, codes::ABS_MT_POSITION_Y, 400 + step * 30),
                    EvdevEvent::syn(t),
                ],
            );
        }
        // one finger lifts; the other keeps moving inside the hand-off window
        opener.push("event4", &touch_up(60, 0));
        for step in 1..=5 {
            opener.push(
                "event4",
                &touch_move(60 + step as u64 * 10, 1, 1200 + step * 40, 520),
            );
        }
        ctx.set_now(115);
        ctx.dispatch().unwrap();
        let during = drain(&mut ctx);
        assert!(
            !during.iter().any(|e| matches!(e, Event::PointerMotion { event } if event.dx != 0.0 || event.dy != 0.0)),
            "motion leaked into the hand-off window"
        );

        // after the hand-off timeout the finger moves the pointer again
        for step in 6..=10 {
            opener.push(
                "event4",
                &touch_move(200 + step as u64 * 10, 1, 1400 + step * 40, 520),
            );
        }
        ctx.set_now(400);
        ctx.dispatch().unwrap();
        let after = drain(&mut ctx);
        assert!(after
            .iter()
            .any(|e| matches!(e, Event::PointerMotion { .. })));
    }

    #[test]
    fn tap_disabled_produces_no_buttons() {
        let (mut ctx, opener) = context();
        ctx.add_device(touchpad_info("event4")).unwrap();
        drain(&mut ctx);
        opener.push("event4", &touch_down(0, 0, 1000, 700));
        opener.push("event4", &touch_up(50, 0));
        ctx.set_now(600);
        ctx.dispatch().unwrap();
        assert!(button_events(&drain(&mut ctx)).is_empty());
    }

    #[test]
    fn keyboard_gone_releases_held_keys() {
        let (mut ctx, opener) = context();
        ctx.add_device(DeviceInfo::keyboard("event0", "kbd")).unwrap();
        drain(&mut ctx);
        opener.push(
            "event0",
            &[EvdevEvent::key(0, codes::KEY_A, true), EvdevEvent::syn(0)],
        );
        ctx.set_now(10);
        ctx.dispatch().unwrap();
        drain(&mut ctx);

        opener.set_gone("event0");
        ctx.set_now(20);
        ctx.dispatch().unwrap();
        let events = drain(&mut ctx);
        let release = events.iter().position(|e| {
            matches!(e, Event::Keyboard { event } if event.state == KeyState::Released && event.seat_key_count == 0)
        });
        let removed = events
            .iter()
            .position(|e| matches!(e, Event::DeviceRemoved { .. }));
        assert!(release.is_some(), "no key release: {events:?}");
        assert!(release < removed);
    }

    #[test]
    fn three_finger_swipe_reports_centroid_motion() {
        let (mut ctx, opener) = context();
        ctx.add_device(touchpad_info("event4")).unwrap();
        drain(&mut ctx);
        opener.push("event4", &touch_down(0, 0, 800, 600));
        opener.push("event4", &touch_down(2, 1, 1000, 600));
        opener.push("event4", &touch_down(4, 2, 1200, 600));
        for step in 1..=6 {
            let t = 10 + step as u64 * 10;
            let y = 600 + step * 30;
            opener.push(
                "event4",
                &[
                    EvdevEvent::abs(t, codes::ABS_MT_SLOT, 0),
                    EvdevEvent::abs(t, codes::ABS_MT_POSITION_Y, y),
                    EvdevEvent::abs(t, codes::ABS_MT_SLOT, 1),
                    EvdevEvent::abs(t, codes::ABS_MT_POSITION_Y, y),
                    EvdevEvent::abs(t, codes::ABS_MT_SLOT, 2),
                    EvdevEvent::abs(t, codes::ABS_MT_POSITION_Y, y),
                    EvdevEvent::syn(t),
                ],
            );
        }
        for (t, slot) in [(100u64, 0i32), (101, 1), (102, 2)] {
            opener.push("event4", &touch_up(t, slot));
        }
        ctx.set_now(600);
        ctx.dispatch().unwrap();
        let events = drain(&mut ctx);

        let begin = events
            .iter()
            .find_map(|e| match e {
                Event::GestureSwipeBegin { event } => Some(event.fingers),
                _ => None,
            })
            .expect("swipe begin");
        assert_eq!(begin, 3);
        let updates: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                Event::GestureSwipeUpdate { event } => Some(event.dy),
                _ => None,
            })
            .collect();
        assert!(!updates.is_empty());
        assert!(updates.iter().all(|dy| *dy > 0.0), "downward swipe: {updates:?}");
        assert!(events.iter().any(|e| matches!(
            e,
            Event::GestureSwipeEnd { event } if !event.cancelled
        )));
        // the fingers belong to the gesture, not to pointing or scrolling
        assert!(!events.iter().any(|e| matches!(e, Event::PointerMotion { .. })));
        assert!(!events.iter().any(|e| matches!(e, Event::PointerAxis { .. })));
    }

    #[test]
    fn spreading_fingers_pinch() {
        let (mut ctx, opener) = context();
        ctx.add_device(touchpad_info("event4")).unwrap();
        drain(&mut ctx);
        opener.push("event4", &touch_down(0, 0, 900, 700));
        opener.push("event4", &touch_down(2, 1, 1100, 700));
        opener.push("event4", &touch_down(4, 2, 1000, 500));
        for step in 1..=6 {
            let t = 10 + step as u64 * 10;
            opener.push(
                "event4",
                &[
                    EvdevEvent::abs(t, codes::ABS_MT_SLOT, 0),
                    EvdevEvent::abs(t, codes::ABS_MT_POSITION_X, 900 - step * 20),
                    EvdevEvent::abs(t, codes::ABS_MT_SLOT, 1),
                    EvdevEvent::abs(t, codes::ABS_MT_POSITION_X, 1100 + step * 20),
                    EvdevEvent::syn(t),
                ],
            );
        }
        for (t, slot) in [(100u64, 0i32), (101, 1), (102, 2)] {
            opener.push("event4", &touch_up(t, slot));
        }
        ctx.set_now(600);
        ctx.dispatch().unwrap();
        let events = drain(&mut ctx);

        assert!(events
            .iter()
            .any(|e| matches!(e, Event::GesturePinchBegin { event } if event.fingers == 3)));
        let scales: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                Event::GesturePinchUpdate { event } => Some(event.scale),
                _ => None,
            })
            .collect();
        assert!(!scales.is_empty());
        assert!(
            scales.last().unwrap() > &1.0,
            "spreading fingers should scale up: {scales:?}"
        );
        assert!(events.iter().any(|e| matches!(
            e,
            Event::GesturePinchEnd { event } if !event.cancelled
        )));
    }
}
