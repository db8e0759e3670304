use events::{Event, EventType};
use log::*;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Quiet period a coalesced handler waits for before acting on a burst.
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(200);

type EventFn = dyn Fn(&Event) + Send + Sync;
type FallbackFn = dyn Fn() + Send + Sync;

/// Which event types a subscription wants to hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    /// Every event type, transport frames (`live:*`) included.
    All,
    /// Every producer event type. Transport frames are left out, so heartbeats
    /// never trigger a coalesced refresh.
    Producers,
    Types(HashSet<EventType>),
}

impl EventFilter {
    pub fn admits(&self, event_type: EventType) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Producers => !event_type.is_transport(),
            EventFilter::Types(types) => types.contains(&event_type),
        }
    }
}

impl From<EventType> for EventFilter {
    fn from(event_type: EventType) -> Self {
        EventFilter::Types(HashSet::from([event_type]))
    }
}

impl<const N: usize> From<[EventType; N]> for EventFilter {
    fn from(event_types: [EventType; N]) -> Self {
        EventFilter::Types(event_types.into_iter().collect())
    }
}

impl From<Vec<EventType>> for EventFilter {
    fn from(event_types: Vec<EventType>) -> Self {
        EventFilter::Types(event_types.into_iter().collect())
    }
}

/// Parses `*` or a comma separated list of event types.
impl FromStr for EventFilter {
    type Err = events::Error;

    fn from_str(filter: &str) -> Result<Self, Self::Err> {
        if filter.trim() == "*" {
            return Ok(EventFilter::All);
        }

        filter
            .split(',')
            .map(|type_tag| type_tag.trim().parse::<EventType>())
            .collect::<Result<HashSet<_>, _>>()
            .map(EventFilter::Types)
    }
}

/// What a subscription does with the events it admits.
#[derive(Clone)]
pub enum Handler {
    /// Called once per admitted event.
    Each(Arc<EventFn>),
    /// Called once with the last event of a burst, after `window` passes with
    /// no further admitted events.
    Coalesced {
        window: Duration,
        action: Arc<EventFn>,
    },
}

impl Handler {
    pub fn each<F>(handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        Handler::Each(Arc::new(handler))
    }

    pub fn coalesced<F>(window: Duration, action: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        Handler::Coalesced {
            window,
            action: Arc::new(action),
        }
    }

    /// A coalesced handler using [`DEFAULT_COALESCE_WINDOW`], suited to
    /// "refetch the page" style reactions.
    pub fn debounced<F>(action: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        Self::coalesced(DEFAULT_COALESCE_WINDOW, action)
    }
}

/// Everything [`Bridge::subscribe`] needs to register a subscription.
pub struct SubscribeOptions {
    pub events: EventFilter,
    pub handler: Handler,
    pub on_fallback: Option<Arc<FallbackFn>>,
}

impl SubscribeOptions {
    pub fn new(events: impl Into<EventFilter>, handler: Handler) -> Self {
        Self {
            events: events.into(),
            handler,
            on_fallback: None,
        }
    }

    /// Called when the live channel gives up, typically to refresh data with a
    /// regular request instead.
    pub fn on_fallback<F>(mut self, on_fallback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_fallback = Some(Arc::new(on_fallback));
        self
    }
}

struct Entry {
    id: u64,
    active: AtomicBool,
    events: EventFilter,
    handler: Handler,
    on_fallback: Option<Arc<FallbackFn>>,
    pending: Mutex<Option<AbortHandle>>,
}

impl Entry {
    fn pending(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(self: &Arc<Self>, event: &Event) {
        match &self.handler {
            Handler::Each(handler) => handler(event),
            Handler::Coalesced { window, action } => self.schedule(*window, action, event),
        }
    }

    // Trailing debounce: every admitted event restarts the quiet period.
    fn schedule(self: &Arc<Self>, window: Duration, action: &Arc<EventFn>, event: &Event) {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(
                    "No async runtime to coalesce {} event {} on, handling it immediately",
                    event.event_type(),
                    event.event_id()
                );
                action(event);
                return;
            }
        };

        let mut pending = self.pending();
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let entry = Arc::clone(self);
        let action = Arc::clone(action);
        let event = event.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(window).await;
            if entry.active.load(Ordering::SeqCst) {
                action(&event);
            }
        });
        *pending = Some(task.abort_handle());
    }

    fn cancel_pending(&self) {
        if let Some(pending) = self.pending().take() {
            pending.abort();
        }
    }
}

struct Inner {
    entries: Mutex<Vec<Arc<Entry>>>,
    next_id: AtomicU64,
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, Vec<Arc<Entry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Vec<Arc<Entry>> {
        self.entries().clone()
    }

    fn remove(&self, entry: &Entry) {
        if entry.active.swap(false, Ordering::SeqCst) {
            entry.cancel_pending();
            self.entries().retain(|other| other.id != entry.id);
            trace!("Removed bridge subscription {}", entry.id);
        }
    }
}

/// Routes events received from the live channel to local subscribers.
///
/// Cloning is cheap; clones share one set of subscriptions.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Bridge {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn subscribe(&self, options: SubscribeOptions) -> BridgeSubscription {
        let entry = Arc::new(Entry {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            active: AtomicBool::new(true),
            events: options.events,
            handler: options.handler,
            on_fallback: options.on_fallback,
            pending: Mutex::new(None),
        });

        self.inner.entries().push(Arc::clone(&entry));
        trace!("Added bridge subscription {}", entry.id);

        BridgeSubscription {
            bridge: Arc::downgrade(&self.inner),
            entry,
        }
    }

    /// Hands `event` to every subscription whose filter admits its type.
    pub fn dispatch(&self, event: &Event) {
        let event_type = event.event_type();
        for entry in self.inner.snapshot() {
            if !entry.active.load(Ordering::SeqCst) || !entry.events.admits(event_type) {
                continue;
            }

            if catch_unwind(AssertUnwindSafe(|| entry.deliver(event))).is_err() {
                error!(
                    "Bridge subscription {} panicked while handling {} event {}",
                    entry.id,
                    event_type,
                    event.event_id()
                );
            }
        }
    }

    /// Tells every subscriber that live updates are unavailable.
    pub fn fallback(&self) {
        for entry in self.inner.snapshot() {
            if !entry.active.load(Ordering::SeqCst) {
                continue;
            }
            if let Some(on_fallback) = &entry.on_fallback {
                if catch_unwind(AssertUnwindSafe(|| on_fallback())).is_err() {
                    error!("Bridge subscription {} panicked while falling back", entry.id);
                }
            }
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.entries().len()
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`Bridge::subscribe`]. Unsubscribing is idempotent,
/// cancels a pending coalesced action, and also happens on drop.
pub struct BridgeSubscription {
    bridge: Weak<Inner>,
    entry: Arc<Entry>,
}

impl BridgeSubscription {
    pub fn unsubscribe(&self) {
        match self.bridge.upgrade() {
            Some(bridge) => bridge.remove(&self.entry),
            None => {
                self.entry.active.store(false, Ordering::SeqCst);
                self.entry.cancel_pending();
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.entry.active.load(Ordering::SeqCst)
    }
}

impl Drop for BridgeSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::kind::{
        AnalyticsUpdated, AppointmentChanged, AppointmentStatus, LiveHeartbeat, NotificationRefresh,
    };
    use events::{EventBus, EventDraft, EventKind, Target};
    use std::sync::atomic::AtomicUsize;

    fn event(kind: EventKind) -> Event {
        EventBus::new()
            .seal(EventDraft::new(kind, Target::broadcast()))
            .unwrap()
    }

    fn refresh() -> Event {
        event(EventKind::NotificationRefresh(NotificationRefresh::default()))
    }

    fn appointment() -> Event {
        event(EventKind::AppointmentChanged(AppointmentChanged {
            appointment_id: "a1".to_string(),
            status: AppointmentStatus::Cancelled,
            date: None,
            barber_id: None,
            user_id: None,
        }))
    }

    fn heartbeat() -> Event {
        event(EventKind::LiveHeartbeat(LiveHeartbeat { timestamp: 0 }))
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Event) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        (count, move |_: &Event| {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn filter_parses_wildcard_and_lists() {
        assert_eq!("*".parse::<EventFilter>().unwrap(), EventFilter::All);
        assert_eq!(
            "notification:new, review:updated".parse::<EventFilter>().unwrap(),
            EventFilter::from([EventType::NotificationNew, EventType::ReviewUpdated])
        );
        assert!("notification:new,bogus".parse::<EventFilter>().is_err());
    }

    #[test]
    fn wildcard_admits_every_type() {
        for event_type in EventType::ALL {
            assert!(EventFilter::All.admits(event_type), "{event_type} not admitted");
        }
    }

    #[test]
    fn producers_filter_skips_transport_frames() {
        assert!(EventFilter::Producers.admits(EventType::AnalyticsUpdated));
        assert!(!EventFilter::Producers.admits(EventType::LiveHeartbeat));
        assert!(!EventFilter::Producers.admits(EventType::LiveStatus));
        assert!(EventFilter::from(EventType::LiveHeartbeat).admits(EventType::LiveHeartbeat));
    }

    #[test]
    fn dispatch_respects_filters() {
        let bridge = Bridge::new();
        let (all, on_all) = counter();
        let (appointments, on_appointment) = counter();
        let (heartbeats, on_heartbeat) = counter();
        let (producers, on_producer) = counter();

        let _producers = bridge.subscribe(SubscribeOptions::new(
            EventFilter::Producers,
            Handler::each(on_producer),
        ));
        let _all = bridge.subscribe(SubscribeOptions::new(EventFilter::All, Handler::each(on_all)));
        let _appointments = bridge.subscribe(SubscribeOptions::new(
            EventType::AppointmentChanged,
            Handler::each(on_appointment),
        ));
        let _heartbeats = bridge.subscribe(SubscribeOptions::new(
            EventType::LiveHeartbeat,
            Handler::each(on_heartbeat),
        ));

        bridge.dispatch(&refresh());
        bridge.dispatch(&appointment());
        bridge.dispatch(&heartbeat());

        assert_eq!(all.load(Ordering::SeqCst), 3);
        assert_eq!(producers.load(Ordering::SeqCst), 2);
        assert_eq!(appointments.load(Ordering::SeqCst), 1);
        assert_eq!(heartbeats.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_handler_does_not_stop_dispatch() {
        let bridge = Bridge::new();
        let (first, on_first) = counter();
        let (last, on_last) = counter();

        let _first = bridge.subscribe(SubscribeOptions::new(EventFilter::All, Handler::each(on_first)));
        let _broken = bridge.subscribe(SubscribeOptions::new(
            EventFilter::All,
            Handler::each(|_| panic!("handler bug")),
        ));
        let _last = bridge.subscribe(SubscribeOptions::new(EventFilter::All, Handler::each(on_last)));

        bridge.dispatch(&refresh());
        bridge.dispatch(&appointment());

        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(last.load(Ordering::SeqCst), 2);
        assert_eq!(bridge.subscription_count(), 3);
    }

    #[test]
    fn panicking_fallback_does_not_stop_the_others() {
        let bridge = Bridge::new();
        let fallbacks = Arc::new(AtomicUsize::new(0));

        let counted = |bridge: &Bridge| {
            let fallbacks = Arc::clone(&fallbacks);
            bridge.subscribe(
                SubscribeOptions::new(EventFilter::All, Handler::each(|_| {})).on_fallback(
                    move || {
                        fallbacks.fetch_add(1, Ordering::SeqCst);
                    },
                ),
            )
        };
        let _first = counted(&bridge);
        let _broken = bridge.subscribe(
            SubscribeOptions::new(EventFilter::All, Handler::each(|_| {}))
                .on_fallback(|| panic!("fallback bug")),
        );
        let _last = counted(&bridge);

        bridge.fallback();
        assert_eq!(fallbacks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_is_idempotent_and_drop_unsubscribes() {
        let bridge = Bridge::new();
        let (count, on_event) = counter();

        let subscription =
            bridge.subscribe(SubscribeOptions::new(EventFilter::All, Handler::each(on_event)));
        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(!subscription.is_active());
        assert_eq!(bridge.subscription_count(), 0);

        bridge.dispatch(&refresh());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let (_, on_event) = counter();
        let dropped =
            bridge.subscribe(SubscribeOptions::new(EventFilter::All, Handler::each(on_event)));
        assert_eq!(bridge.subscription_count(), 1);
        drop(dropped);
        assert_eq!(bridge.subscription_count(), 0);
    }

    #[test]
    fn fallback_reaches_active_subscribers_only() {
        let bridge = Bridge::new();
        let fallbacks = Arc::new(AtomicUsize::new(0));

        let register = |bridge: &Bridge| {
            let fallbacks = Arc::clone(&fallbacks);
            bridge.subscribe(
                SubscribeOptions::new(EventFilter::All, Handler::each(|_| {})).on_fallback(
                    move || {
                        fallbacks.fetch_add(1, Ordering::SeqCst);
                    },
                ),
            )
        };
        let _kept = register(&bridge);
        let removed = register(&bridge);
        let _silent = bridge.subscribe(SubscribeOptions::new(
            EventFilter::All,
            Handler::each(|_| {}),
        ));
        removed.unsubscribe();

        bridge.fallback();
        assert_eq!(fallbacks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_events_coalesces_into_one_action() {
        let bridge = Bridge::new();
        let (refreshes, on_refresh) = counter();
        let _subscription = bridge.subscribe(SubscribeOptions::new(
            EventFilter::All,
            Handler::debounced(on_refresh),
        ));

        // Five events within 100ms
        for _ in 0..5 {
            bridge.dispatch(&event(EventKind::AnalyticsUpdated(AnalyticsUpdated::default())));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);

        tokio::time::sleep(DEFAULT_COALESCE_WINDOW).await;
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn coalesced_action_receives_the_last_event() {
        let bridge = Bridge::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = bridge.subscribe(SubscribeOptions::new(
            EventFilter::All,
            Handler::coalesced(Duration::from_millis(50), move |event: &Event| {
                sink.lock().unwrap().push(event.event_type());
            }),
        ));

        bridge.dispatch(&refresh());
        bridge.dispatch(&appointment());
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(*seen.lock().unwrap(), vec![EventType::AppointmentChanged]);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_cancels_a_pending_coalesced_action() {
        let bridge = Bridge::new();
        let (refreshes, on_refresh) = counter();
        let subscription = bridge.subscribe(SubscribeOptions::new(
            EventFilter::All,
            Handler::debounced(on_refresh),
        ));

        bridge.dispatch(&refresh());
        tokio::time::sleep(Duration::from_millis(50)).await;
        subscription.unsubscribe();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn coalesced_handler_without_runtime_acts_immediately() {
        let bridge = Bridge::new();
        let (refreshes, on_refresh) = counter();
        let _subscription = bridge.subscribe(SubscribeOptions::new(
            EventFilter::All,
            Handler::debounced(on_refresh),
        ));

        bridge.dispatch(&refresh());
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }
}
