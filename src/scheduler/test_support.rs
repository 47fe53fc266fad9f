//! In-memory fakes used by the scheduler test modules.
//!
//! Each fake implements the same trait as its production counterpart so
//! the poller, executor and service can be exercised without Redis,
//! Postgres or any external collaborator.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::dialer::{CallDialer, CallPlacement, DialError, PlacedCall};
use crate::notify::{Notifier, NotifyError};
use crate::storage::{HistoryPage, JobStore, StoreError};

use super::job::{
    CallOutcome, CallStats, HistoryRecord, JobStatus, NewHistoryRecord, QueueMessage, Recurrence,
    ScheduleRequest, ScheduledCall, DEFAULT_LANGUAGE,
};
use super::queue::{QueueError, WorkQueue};

/// Builds a pending call whose trigger time passed an hour ago.
pub(crate) fn past_call(user_id: i64, recurrence: Recurrence) -> ScheduledCall {
    ScheduledCall {
        id: 0,
        phone_number: "+15551234567".to_string(),
        message: Some("Your appointment is tomorrow".to_string()),
        language: DEFAULT_LANGUAGE.to_string(),
        platform: None,
        schedule_time: Utc::now() - ChronoDuration::hours(1),
        recurrence,
        status: JobStatus::Pending,
        user_id,
    }
}

#[derive(Default)]
struct MemoryStoreInner {
    calls: Vec<ScheduledCall>,
    history: Vec<HistoryRecord>,
    next_call_id: i64,
    next_history_id: i64,
}

/// In-memory [`JobStore`].
#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts a call directly, assigning the next id.
    pub(crate) async fn insert_call(&self, mut call: ScheduledCall) -> ScheduledCall {
        let mut inner = self.inner.lock().unwrap();
        inner.next_call_id += 1;
        call.id = inner.next_call_id;
        inner.calls.push(call.clone());
        call
    }

    /// Returns the stored call with the given id. Panics if absent.
    pub(crate) async fn call(&self, id: i64) -> ScheduledCall {
        let inner = self.inner.lock().unwrap();
        inner
            .calls
            .iter()
            .find(|call| call.id == id)
            .cloned()
            .expect("call should exist")
    }

    /// Returns all history rows in append order.
    pub(crate) async fn history(&self) -> Vec<HistoryRecord> {
        self.inner.lock().unwrap().history.clone()
    }

    /// Returns the number of stored scheduled calls.
    pub(crate) async fn scheduled_count(&self) -> usize {
        self.inner.lock().unwrap().calls.len()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_scheduled_call(
        &self,
        request: &ScheduleRequest,
    ) -> Result<ScheduledCall, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_call_id += 1;
        let call = ScheduledCall {
            id: inner.next_call_id,
            phone_number: request.phone_number.clone(),
            message: request.message.clone(),
            language: request.language.clone(),
            platform: request.platform.clone(),
            schedule_time: request.schedule_time,
            recurrence: request.recurrence,
            status: JobStatus::Pending,
            user_id: request.user_id,
        };
        inner.calls.push(call.clone());
        Ok(call)
    }

    async fn get_scheduled_call(
        &self,
        id: i64,
        user_id: i64,
    ) -> Result<Option<ScheduledCall>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .calls
            .iter()
            .find(|call| call.id == id && call.user_id == user_id)
            .cloned())
    }

    async fn claim_due_calls(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledCall>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut claimed = Vec::new();
        for call in inner.calls.iter_mut() {
            if call.status == JobStatus::Pending && call.schedule_time <= now {
                call.status = JobStatus::Queued;
                claimed.push(call.clone());
            }
        }
        Ok(claimed)
    }

    async fn release_claim(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(call) = inner
            .calls
            .iter_mut()
            .find(|call| call.id == id && call.status == JobStatus::Queued)
        {
            call.status = JobStatus::Pending;
        }
        Ok(())
    }

    async fn set_status(&self, id: i64, status: JobStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(call) = inner.calls.iter_mut().find(|call| call.id == id) {
            call.status = status;
        }
        Ok(())
    }

    async fn update_schedule(
        &self,
        id: i64,
        schedule_time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(call) = inner.calls.iter_mut().find(|call| call.id == id) {
            call.schedule_time = schedule_time;
            call.status = JobStatus::Pending;
        }
        Ok(())
    }

    async fn active_recurring_calls(&self) -> Result<Vec<ScheduledCall>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .calls
            .iter()
            .filter(|call| call.recurrence.is_recurring() && call.status != JobStatus::Cancelled)
            .cloned()
            .collect())
    }

    async fn append_history(&self, record: &NewHistoryRecord) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_history_id += 1;
        let id = inner.next_history_id;
        inner.history.push(HistoryRecord {
            id,
            user_id: record.user_id,
            phone_number: record.phone_number.clone(),
            call_sid: record.call_sid.clone(),
            status: record.status,
            timestamp: record.timestamp,
            recording_url: None,
        });
        Ok(id)
    }

    async fn get_history_record(
        &self,
        id: i64,
        user_id: i64,
    ) -> Result<Option<HistoryRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .history
            .iter()
            .find(|record| record.id == id && record.user_id == user_id)
            .cloned())
    }

    async fn list_history(
        &self,
        user_id: i64,
        page: u32,
        page_size: u32,
    ) -> Result<HistoryPage, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut records: Vec<_> = inner
            .history
            .iter()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));

        let total = records.len() as u64;
        let page = page.max(1);
        let page_size = page_size.max(1);
        let start = ((page - 1) * page_size) as usize;
        let records = records.into_iter().skip(start).take(page_size as usize).collect();

        Ok(HistoryPage {
            records,
            page,
            total_pages: (total.div_ceil(page_size as u64)) as u32,
            total,
        })
    }

    async fn attach_recording(
        &self,
        call_sid: &str,
        recording_url: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner
            .history
            .iter_mut()
            .find(|record| record.call_sid.as_deref() == Some(call_sid))
        {
            record.recording_url = Some(recording_url.to_string());
        }
        Ok(())
    }

    async fn update_history_status(
        &self,
        call_sid: &str,
        status: CallOutcome,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner
            .history
            .iter_mut()
            .find(|record| record.call_sid.as_deref() == Some(call_sid))
        {
            record.status = status;
        }
        Ok(())
    }

    async fn user_stats(&self, user_id: i64) -> Result<CallStats, StoreError> {
        let inner = self.inner.lock().unwrap();
        let total = inner
            .history
            .iter()
            .filter(|record| record.user_id == user_id)
            .count() as u64;
        let completed = inner
            .history
            .iter()
            .filter(|record| record.user_id == user_id && record.status == CallOutcome::Completed)
            .count() as u64;
        let pending = inner
            .calls
            .iter()
            .filter(|call| call.user_id == user_id && call.status == JobStatus::Pending)
            .count() as u64;

        Ok(CallStats {
            total_calls: total,
            completed_calls: completed,
            pending_scheduled: pending,
        })
    }
}

/// In-memory [`WorkQueue`] with an injectable enqueue failure.
#[derive(Default)]
pub(crate) struct MemoryQueue {
    items: Mutex<VecDeque<QueueMessage>>,
    fail_next: AtomicBool,
}

impl MemoryQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes the next enqueue fail once.
    pub(crate) fn fail_next_enqueue(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn enqueue(&self, message: &QueueMessage) -> Result<(), QueueError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(QueueError::ConnectionFailed(
                "injected enqueue failure".to_string(),
            ));
        }
        self.items.lock().unwrap().push_back(message.clone());
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<QueueMessage>, QueueError> {
        Ok(self.items.lock().unwrap().pop_front())
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.items.lock().unwrap().len())
    }
}

/// Scriptable [`CallDialer`] stub.
pub(crate) struct StubDialer {
    failures_remaining: AtomicU32,
    always_fail: bool,
    sid: String,
    attempts: Arc<AtomicU32>,
}

impl StubDialer {
    /// Succeeds on every attempt with the given sid.
    pub(crate) fn succeeding(sid: impl Into<String>) -> Self {
        Self {
            failures_remaining: AtomicU32::new(0),
            always_fail: false,
            sid: sid.into(),
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fails `count` attempts, then succeeds with the given sid.
    pub(crate) fn fail_times(count: u32, sid: impl Into<String>) -> Self {
        Self {
            failures_remaining: AtomicU32::new(count),
            always_fail: false,
            sid: sid.into(),
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fails every attempt.
    pub(crate) fn always_failing() -> Self {
        Self {
            failures_remaining: AtomicU32::new(0),
            always_fail: true,
            sid: String::new(),
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Returns a handle to the attempt counter.
    pub(crate) fn attempts_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.attempts)
    }
}

#[async_trait]
impl CallDialer for StubDialer {
    async fn place_call(&self, _placement: &CallPlacement) -> Result<PlacedCall, DialError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.always_fail {
            return Err(DialError::RequestFailed("stub dial failure".to_string()));
        }

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(DialError::RequestFailed("stub transient failure".to_string()));
        }

        Ok(PlacedCall {
            sid: self.sid.clone(),
        })
    }
}

/// [`Notifier`] that records deliveries, optionally failing them all.
pub(crate) struct RecordingNotifier {
    messages: Arc<Mutex<Vec<(i64, String)>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub(crate) fn new() -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// A notifier whose deliveries all fail.
    pub(crate) fn failing() -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    /// Returns a handle to the recorded `(user_id, text)` deliveries.
    pub(crate) fn messages_handle(&self) -> Arc<Mutex<Vec<(i64, String)>>> {
        Arc::clone(&self.messages)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: i64, text: &str) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::RequestFailed(
                "stub notifier unavailable".to_string(),
            ));
        }
        self.messages
            .lock()
            .unwrap()
            .push((user_id, text.to_string()));
        Ok(())
    }
}
