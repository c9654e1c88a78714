use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use super::*;
use crate::errors::{Error, Result};
use crate::test_support::MockRemoteStore;
use crate::transactions::{
    Category, EntryState, NewTransaction, OptimisticTransactionStore, Transaction,
};

struct Harness {
    remote: Arc<MockRemoteStore>,
    queue: Arc<MemoryOfflineQueue>,
    store: Arc<OptimisticTransactionStore>,
    monitor: ConnectivityMonitor,
    coordinator: Arc<SyncCoordinator>,
}

fn harness(initial: ConnectivityState) -> Harness {
    harness_with_queue(initial, Arc::new(MemoryOfflineQueue::new()))
}

fn harness_with_queue(initial: ConnectivityState, queue: Arc<MemoryOfflineQueue>) -> Harness {
    let remote = Arc::new(MockRemoteStore::new());
    let store = Arc::new(OptimisticTransactionStore::new(remote.clone()));
    let monitor = ConnectivityMonitor::new(initial);
    let coordinator = Arc::new(SyncCoordinator::new(
        store.clone(),
        queue.clone(),
        remote.clone(),
        monitor.clone(),
    ));
    Harness {
        remote,
        queue,
        store,
        monitor,
        coordinator,
    }
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 14, hour, minute, 0).unwrap()
}

fn draft(description: &str, category: Category, amount: Decimal, date: DateTime<Utc>) -> NewTransaction {
    NewTransaction::new(description, category, amount, date).unwrap()
}

/// Goes back online the way a user would see it: remote reachable, state online.
fn reconnect(h: &Harness) {
    h.remote.set_reachable(true);
    h.monitor.set(ConnectivityState::Online);
}

async fn wait_for_replay(events: &mut broadcast::Receiver<SyncEvent>) -> ReplaySummary {
    loop {
        match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
            Ok(Ok(SyncEvent::ReplayFinished(summary))) => return summary,
            Ok(Ok(_)) => continue,
            other => panic!("no replay finished event: {:?}", other.is_ok()),
        }
    }
}

#[tokio::test]
async fn online_creation_is_confirmed_in_place() {
    let h = harness(ConnectivityState::Online);

    let outcome = h
        .coordinator
        .create(draft("Lunch", Category::Food, dec!(9.80), at(12, 30)))
        .await;

    let CreateOutcome::Confirmed { transaction, .. } = outcome else {
        panic!("expected confirmation, got {:?}", outcome);
    };
    let entries = h.store.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].state, EntryState::Confirmed);
    assert_eq!(entries[0].transaction, transaction);
    assert!(h.queue.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn online_rejection_rolls_back_and_notifies() {
    let h = harness(ConnectivityState::Online);
    h.remote.set_reject_inserts(true);
    let mut events = h.coordinator.subscribe();

    let outcome = h
        .coordinator
        .create(draft("Cinema", Category::Entertainment, dec!(11), at(19, 0)))
        .await;

    assert!(matches!(outcome, CreateOutcome::RolledBack { .. }));
    assert!(h.store.is_empty());
    assert!(h.queue.list_pending().await.unwrap().is_empty());
    assert!(matches!(
        events.recv().await.unwrap(),
        SyncEvent::RolledBack { .. }
    ));
}

#[tokio::test]
async fn online_network_failure_also_rolls_back() {
    let h = harness(ConnectivityState::Online);
    h.remote.set_reachable(false);

    let outcome = h
        .coordinator
        .create(draft("Taxi", Category::Transport, dec!(18), at(23, 10)))
        .await;

    assert!(matches!(outcome, CreateOutcome::RolledBack { .. }));
    assert!(h.store.is_empty());
    assert!(h.queue.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn offline_creations_are_queued_and_not_lost() {
    let h = harness(ConnectivityState::Offline);
    h.remote.set_reachable(false);

    let drafts = vec![
        draft("Bread", Category::Food, dec!(2.10), at(8, 0)),
        draft("Train", Category::Transport, dec!(5.60), at(8, 30)),
        draft("Pharmacy", Category::Health, dec!(7.25), at(9, 15)),
    ];
    for d in &drafts {
        let outcome = h.coordinator.create(d.clone()).await;
        assert!(matches!(outcome, CreateOutcome::Queued { durable: false, .. }));
    }
    assert_eq!(h.queue.list_pending().await.unwrap().len(), 3);
    assert!(h
        .store
        .entries()
        .iter()
        .all(|e| e.state == EntryState::Queued));
    assert_eq!(h.remote.insert_calls(), 0);

    reconnect(&h);
    let summary = h.coordinator.replay(ReplayTrigger::Manual).await.unwrap();
    assert_eq!(summary.confirmed, 3);

    let rows = h.remote.rows();
    assert_eq!(rows.len(), 3);
    for (row, original) in rows.iter().zip(&drafts) {
        assert_eq!(row.description, original.description);
        assert_eq!(row.amount, original.amount);
        assert_eq!(row.date, original.date);
    }
    assert!(h.queue.list_pending().await.unwrap().is_empty());
    assert_eq!(h.store.len(), 3);
    assert!(h
        .store
        .entries()
        .iter()
        .all(|e| e.state == EntryState::Confirmed));
}

#[tokio::test]
async fn coffee_and_bus_scenario() {
    let h = harness(ConnectivityState::Offline);
    h.remote.set_reachable(false);
    let coffee = draft("Coffee", Category::Food, dec!(3.50), at(7, 45));
    let bus = draft("Bus", Category::Transport, dec!(2.00), at(8, 5));

    h.coordinator.create(coffee.clone()).await;
    h.coordinator.create(bus.clone()).await;
    assert_eq!(h.queue.list_pending().await.unwrap().len(), 2);

    reconnect(&h);
    h.coordinator.replay(ReplayTrigger::ConnectivityRestored).await.unwrap();

    let rows = h.remote.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].description, "Coffee");
    assert_eq!(rows[0].category, Category::Food);
    assert_eq!(rows[0].amount, dec!(3.50));
    assert_eq!(rows[0].date, coffee.date);
    assert_eq!(rows[1].description, "Bus");
    assert_eq!(rows[1].category, Category::Transport);
    assert_eq!(rows[1].amount, dec!(2.00));
    assert_eq!(rows[1].date, bus.date);
    assert!(h.queue.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn replay_preserves_enqueue_order() {
    let h = harness(ConnectivityState::Offline);
    // Dates deliberately out of order: replay follows enqueue order, not date.
    h.coordinator.create(draft("A", Category::Other, dec!(1), at(10, 0))).await;
    h.coordinator.create(draft("B", Category::Other, dec!(2), at(9, 0))).await;
    h.coordinator.create(draft("C", Category::Other, dec!(3), at(11, 0))).await;

    reconnect(&h);
    h.coordinator.replay(ReplayTrigger::Manual).await.unwrap();

    let order: Vec<String> = h.remote.rows().into_iter().map(|t| t.description).collect();
    assert_eq!(order, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn second_replay_of_removed_entry_is_a_no_op() {
    let h = harness(ConnectivityState::Offline);
    h.coordinator.create(draft("Tea", Category::Food, dec!(2.40), at(15, 0))).await;

    reconnect(&h);
    let first = h.coordinator.replay(ReplayTrigger::Manual).await.unwrap();
    let second = h.coordinator.replay(ReplayTrigger::Manual).await.unwrap();

    assert_eq!(first.confirmed, 1);
    assert_eq!(second.pending, 0);
    assert_eq!(second.confirmed, 0);
    assert_eq!(h.remote.insert_calls(), 1);
    assert_eq!(h.remote.rows().len(), 1);
}

#[tokio::test]
async fn entry_claimed_by_another_session_is_skipped() {
    let queue = Arc::new(MemoryOfflineQueue::new());
    let tab_a = harness_with_queue(ConnectivityState::Offline, queue.clone());
    let tab_b = harness_with_queue(ConnectivityState::Online, queue.clone());

    tab_a
        .coordinator
        .create(draft("Socks", Category::Shopping, dec!(6), at(13, 0)))
        .await;
    let pending = queue.list_pending().await.unwrap();
    assert!(queue
        .claim(&pending[0].local_id, tab_a.coordinator.session_id())
        .await
        .unwrap());

    let summary = tab_b.coordinator.replay(ReplayTrigger::Manual).await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(tab_b.remote.insert_calls(), 0);
    assert_eq!(queue.list_pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn one_failed_entry_does_not_abort_the_rest() {
    let h = harness(ConnectivityState::Offline);
    h.coordinator.create(draft("A", Category::Other, dec!(1), at(10, 0))).await;
    let b_id = match h.coordinator.create(draft("B", Category::Other, dec!(2), at(10, 5))).await {
        CreateOutcome::Queued { local_id, .. } => local_id,
        other => panic!("expected queued, got {:?}", other),
    };
    h.coordinator.create(draft("C", Category::Other, dec!(3), at(10, 10))).await;

    reconnect(&h);
    h.remote.reject_description("B");
    let summary = h.coordinator.replay(ReplayTrigger::Manual).await.unwrap();

    assert_eq!(summary.confirmed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.permanent_failures, 1);
    let remaining = h.queue.list_pending().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].local_id, b_id);
    assert_eq!(h.store.state_of(&b_id), Some(EntryState::Queued));

    // The released claim lets a later pass retry it.
    let retry = harness_with_queue(ConnectivityState::Online, h.queue.clone());
    let summary = retry.coordinator.replay(ReplayTrigger::Manual).await.unwrap();
    assert_eq!(summary.confirmed, 1);
}

struct UnavailableQueue;

#[async_trait]
impl OfflineQueueTrait for UnavailableQueue {
    async fn enqueue(&self, _entry: QueueEntry) -> Result<()> {
        Err(Error::storage("database is locked"))
    }
    async fn list_pending(&self) -> Result<Vec<QueueEntry>> {
        Err(Error::storage("database is locked"))
    }
    async fn claim(&self, _local_id: &str, _owner: &str) -> Result<bool> {
        Err(Error::storage("database is locked"))
    }
    async fn release(&self, _local_id: &str, _owner: &str) -> Result<()> {
        Ok(())
    }
    async fn remove(&self, _local_id: &str) -> Result<()> {
        Ok(())
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    async fn is_durable(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn storage_failure_keeps_offline_entry_for_the_session() {
    let remote = Arc::new(MockRemoteStore::new());
    let store = Arc::new(OptimisticTransactionStore::new(remote.clone()));
    let monitor = ConnectivityMonitor::new(ConnectivityState::Offline);
    let coordinator = SyncCoordinator::new(
        store.clone(),
        Arc::new(UnavailableQueue),
        remote.clone(),
        monitor.clone(),
    );
    let first = store.insert_optimistic(draft("Existing", Category::Other, dec!(1), at(9, 0)));

    let outcome = coordinator
        .create(draft("Sandwich", Category::Food, dec!(4.50), at(12, 0)))
        .await;

    assert!(matches!(outcome, CreateOutcome::Queued { durable: false, .. }));
    assert_eq!(store.len(), 2);
    assert_eq!(store.state_of(outcome.local_id()), Some(EntryState::Queued));
    assert_eq!(store.state_of(&first), Some(EntryState::Tentative));
    assert_eq!(coordinator.session_only_pending().await.unwrap().len(), 1);

    monitor.set(ConnectivityState::Online);
    let summary = coordinator.replay(ReplayTrigger::Manual).await.unwrap();
    assert_eq!(summary.confirmed, 1);
    assert_eq!(remote.rows().len(), 1);
    assert_eq!(remote.rows()[0].description, "Sandwich");
    assert!(coordinator.session_only_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn broken_queue_with_nothing_in_session_fails_the_replay() {
    let remote = Arc::new(MockRemoteStore::new());
    let coordinator = SyncCoordinator::new(
        Arc::new(OptimisticTransactionStore::new(remote.clone())),
        Arc::new(UnavailableQueue),
        remote,
        ConnectivityMonitor::new(ConnectivityState::Online),
    );

    let err = coordinator.replay(ReplayTrigger::Manual).await.unwrap_err();
    assert!(matches!(err, Error::StorageUnavailable(_)));
}

/// Memory queue that fails a set number of enqueues and removes.
struct FlakyQueue {
    inner: MemoryOfflineQueue,
    enqueue_failures: AtomicUsize,
    remove_failures: AtomicUsize,
}

impl FlakyQueue {
    fn new(enqueue_failures: usize, remove_failures: usize) -> Self {
        Self {
            inner: MemoryOfflineQueue::new(),
            enqueue_failures: AtomicUsize::new(enqueue_failures),
            remove_failures: AtomicUsize::new(remove_failures),
        }
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl OfflineQueueTrait for FlakyQueue {
    async fn enqueue(&self, entry: QueueEntry) -> Result<()> {
        if take_failure(&self.enqueue_failures) {
            return Err(Error::storage("disk I/O error"));
        }
        self.inner.enqueue(entry).await
    }
    async fn list_pending(&self) -> Result<Vec<QueueEntry>> {
        self.inner.list_pending().await
    }
    async fn claim(&self, local_id: &str, owner: &str) -> Result<bool> {
        self.inner.claim(local_id, owner).await
    }
    async fn release(&self, local_id: &str, owner: &str) -> Result<()> {
        self.inner.release(local_id, owner).await
    }
    async fn remove(&self, local_id: &str) -> Result<()> {
        if take_failure(&self.remove_failures) {
            return Err(Error::storage("disk I/O error"));
        }
        self.inner.remove(local_id).await
    }
    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }
    async fn is_durable(&self) -> bool {
        true
    }
}

fn flaky_harness(
    initial: ConnectivityState,
    queue: Arc<FlakyQueue>,
) -> (Arc<MockRemoteStore>, Arc<OptimisticTransactionStore>, ConnectivityMonitor, SyncCoordinator) {
    let remote = Arc::new(MockRemoteStore::new());
    let store = Arc::new(OptimisticTransactionStore::new(remote.clone()));
    let monitor = ConnectivityMonitor::new(initial);
    let coordinator = SyncCoordinator::new(store.clone(), queue, remote.clone(), monitor.clone());
    (remote, store, monitor, coordinator)
}

#[tokio::test]
async fn refused_enqueue_is_still_replayed_in_order() {
    let queue = Arc::new(FlakyQueue::new(1, 0));
    let (remote, store, monitor, coordinator) =
        flaky_harness(ConnectivityState::Offline, queue.clone());

    let sandwich = coordinator
        .create(draft("Sandwich", Category::Food, dec!(4.50), at(12, 0)))
        .await;
    tokio::time::sleep(Duration::from_millis(2)).await;
    let coffee = coordinator
        .create(draft("Coffee", Category::Food, dec!(2.20), at(12, 5)))
        .await;

    assert!(matches!(sandwich, CreateOutcome::Queued { durable: false, .. }));
    assert!(matches!(coffee, CreateOutcome::Queued { durable: true, .. }));
    assert_eq!(queue.list_pending().await.unwrap().len(), 1);

    monitor.set(ConnectivityState::Online);
    let summary = coordinator.replay(ReplayTrigger::Manual).await.unwrap();

    assert_eq!(summary.pending, 2);
    assert_eq!(summary.confirmed, 2);
    let descriptions: Vec<_> = remote.rows().into_iter().map(|t| t.description).collect();
    assert_eq!(descriptions, vec!["Sandwich", "Coffee"]);
    assert_eq!(store.state_of(sandwich.local_id()), None);
    assert_eq!(store.confirmed_transactions().len(), 2);
    assert!(queue.list_pending().await.unwrap().is_empty());
    assert!(coordinator.session_only_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_remove_resends_once_on_the_next_pass() {
    let queue = Arc::new(FlakyQueue::new(0, 1));
    let (remote, store, monitor, coordinator) =
        flaky_harness(ConnectivityState::Offline, queue.clone());
    let outcome = coordinator
        .create(draft("Groceries", Category::Food, dec!(23.10), at(18, 0)))
        .await;

    monitor.set(ConnectivityState::Online);
    let first = coordinator.replay(ReplayTrigger::Manual).await.unwrap();
    assert_eq!(first.confirmed, 1);
    assert_eq!(first.left_queued, 1);
    assert_eq!(queue.list_pending().await.unwrap().len(), 1);
    assert_eq!(store.state_of(outcome.local_id()), None);
    assert_eq!(store.confirmed_transactions().len(), 1);

    let second = coordinator.replay(ReplayTrigger::Manual).await.unwrap();
    assert_eq!(second.confirmed, 1);
    assert_eq!(second.left_queued, 0);
    assert!(queue.list_pending().await.unwrap().is_empty());
    assert_eq!(remote.insert_calls(), 2);
    // Without an idempotency key the remote store ends up with both copies.
    assert_eq!(remote.rows().len(), 2);
    assert_eq!(store.confirmed_transactions().len(), 1);

    let third = coordinator.replay(ReplayTrigger::Manual).await.unwrap();
    assert_eq!(third.pending, 0);
    assert_eq!(remote.insert_calls(), 2);
}

#[tokio::test]
async fn failed_remove_with_idempotent_remote_keeps_one_row() {
    let queue = Arc::new(FlakyQueue::new(0, 1));
    let (remote, _store, monitor, coordinator) =
        flaky_harness(ConnectivityState::Offline, queue.clone());
    remote.set_idempotent(true);
    coordinator
        .create(draft("Groceries", Category::Food, dec!(23.10), at(18, 0)))
        .await;

    monitor.set(ConnectivityState::Online);
    coordinator.replay(ReplayTrigger::Manual).await.unwrap();
    coordinator.replay(ReplayTrigger::Manual).await.unwrap();

    assert_eq!(remote.insert_calls(), 2);
    assert_eq!(remote.rows().len(), 1);
    assert!(queue.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn replay_failures_are_classified() {
    let h = harness(ConnectivityState::Offline);
    h.coordinator.create(draft("Rent", Category::Housing, dec!(800), at(8, 0))).await;
    h.coordinator.create(draft("Bus", Category::Transport, dec!(2), at(8, 30))).await;

    h.remote.set_reachable(false);
    h.monitor.set(ConnectivityState::Online);
    let unreachable = h.coordinator.replay(ReplayTrigger::Manual).await.unwrap();
    assert_eq!(unreachable.failed, 2);
    assert_eq!(unreachable.permanent_failures, 0);

    h.remote.set_reachable(true);
    h.remote.reject_description("Rent");
    let rejected = h.coordinator.replay(ReplayTrigger::Manual).await.unwrap();
    assert_eq!(rejected.confirmed, 1);
    assert_eq!(rejected.failed, 1);
    assert_eq!(rejected.permanent_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn overlapping_replays_run_once() {
    let h = harness(ConnectivityState::Offline);
    h.coordinator.create(draft("Book", Category::Shopping, dec!(12), at(16, 0))).await;
    reconnect(&h);
    h.remote.set_insert_delay(Duration::from_millis(200));

    let (a, b) = tokio::join!(
        h.coordinator.replay(ReplayTrigger::ConnectivityRestored),
        h.coordinator.replay(ReplayTrigger::BackgroundSignal),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.already_running ^ b.already_running);
    assert_eq!(h.remote.rows().len(), 1);
    assert_eq!(h.remote.insert_calls(), 1);
}

#[tokio::test]
async fn replay_without_tentative_entry_still_saves_remotely() {
    let h = harness(ConnectivityState::Online);
    let d = draft("Old tab", Category::Other, dec!(5), at(6, 0));
    h.queue
        .enqueue(QueueEntry::from_draft("orphan-1", &d, Utc::now()))
        .await
        .unwrap();

    let summary = h.coordinator.replay(ReplayTrigger::Manual).await.unwrap();

    assert_eq!(summary.confirmed, 1);
    assert_eq!(h.remote.rows().len(), 1);
    assert!(h.store.is_empty());
    assert!(h.queue.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn start_restores_queued_entries_while_offline() {
    let queue = Arc::new(MemoryOfflineQueue::new());
    let d = draft("Queued earlier", Category::Food, dec!(3), at(7, 0));
    queue
        .enqueue(QueueEntry::from_draft("q-1", &d, Utc::now()))
        .await
        .unwrap();
    let h = harness_with_queue(ConnectivityState::Offline, queue);
    h.remote.seed(draft("Confirmed", Category::Food, dec!(8), at(6, 0)).into_transaction("r-1"));

    h.coordinator.start().await.unwrap();

    let entries = h.store.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].transaction.id, "q-1");
    assert_eq!(entries[0].state, EntryState::Queued);
    assert_eq!(entries[1].state, EntryState::Confirmed);
    assert_eq!(h.remote.insert_calls(), 0);
}

#[tokio::test]
async fn start_while_online_replays_the_queue() {
    let queue = Arc::new(MemoryOfflineQueue::new());
    let d = draft("Queued earlier", Category::Food, dec!(3), at(7, 0));
    queue
        .enqueue(QueueEntry::from_draft("q-1", &d, Utc::now()))
        .await
        .unwrap();
    let h = harness_with_queue(ConnectivityState::Online, queue);

    h.coordinator.start().await.unwrap();

    assert_eq!(h.remote.rows().len(), 1);
    assert!(h.queue.list_pending().await.unwrap().is_empty());
    let entries = h.store.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].state, EntryState::Confirmed);
    assert_eq!(entries[0].local_id.as_deref(), Some("q-1"));
}

#[tokio::test]
async fn reconnect_transition_triggers_replay() {
    let h = harness(ConnectivityState::Offline);
    h.coordinator.ensure_background_started(None).await;
    let mut events = h.coordinator.subscribe();

    h.coordinator.create(draft("Milk", Category::Food, dec!(1.10), at(18, 0))).await;
    reconnect(&h);

    let summary = wait_for_replay(&mut events).await;
    assert_eq!(summary.trigger, ReplayTrigger::ConnectivityRestored);
    assert_eq!(summary.confirmed, 1);
    assert!(h.queue.list_pending().await.unwrap().is_empty());
    h.coordinator.ensure_background_stopped().await;
}

#[tokio::test]
async fn background_signal_triggers_replay_when_transition_was_missed() {
    let h = harness(ConnectivityState::Offline);
    let (signal_tx, signal_rx) = broadcast::channel(4);
    h.coordinator.ensure_background_started(Some(signal_rx)).await;
    h.coordinator.ensure_background_started(None).await;
    let mut events = h.coordinator.subscribe();

    h.coordinator.create(draft("Stamps", Category::Other, dec!(4), at(11, 0))).await;
    // Remote is reachable again but this session never saw the transition.
    h.remote.set_reachable(true);
    signal_tx.send(BackgroundMessage::SyncTransactions).unwrap();

    let summary = wait_for_replay(&mut events).await;
    assert_eq!(summary.trigger, ReplayTrigger::BackgroundSignal);
    assert_eq!(summary.confirmed, 1);
    assert_eq!(h.remote.rows().len(), 1);
    h.coordinator.ensure_background_stopped().await;
}

#[tokio::test]
async fn submit_returns_immediately_and_settles_later() {
    let h = harness(ConnectivityState::Online);
    let mut events = h.coordinator.subscribe();

    let local_id = h
        .coordinator
        .submit(draft("Pizza", Category::Food, dec!(14), at(20, 0)));
    assert_eq!(h.store.len(), 1);

    match events.recv().await.unwrap() {
        SyncEvent::Confirmed { local_id: id, .. } => assert_eq!(id, local_id),
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(h.store.entries()[0].state, EntryState::Confirmed);
}

struct CountingListener {
    calls: AtomicUsize,
    last_len: AtomicUsize,
}

#[async_trait]
impl ConfirmedWriteListener for CountingListener {
    async fn on_confirmed_write(&self, confirmed: &[Transaction]) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_len.store(confirmed.len(), Ordering::SeqCst);
    }
}

#[tokio::test]
async fn listeners_hear_about_confirmed_writes_only() {
    let h = harness(ConnectivityState::Online);
    let listener = Arc::new(CountingListener {
        calls: AtomicUsize::new(0),
        last_len: AtomicUsize::new(0),
    });
    h.coordinator.add_listener(listener.clone());

    h.coordinator.create(draft("One", Category::Other, dec!(1), at(9, 0))).await;
    h.monitor.set(ConnectivityState::Offline);
    h.coordinator.create(draft("Two", Category::Other, dec!(2), at(9, 5))).await;

    assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
    assert_eq!(listener.last_len.load(Ordering::SeqCst), 1);
}
