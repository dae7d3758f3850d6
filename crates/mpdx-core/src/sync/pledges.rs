//! Pledge sync: paged fetch per appeal and push of local edits

use std::sync::Arc;

use tokio::sync::Mutex;

use super::{
    fetch_pages, ApiError, DirtySyncCoordinator, PartialUpdate, PledgeApi, SyncError,
    SyncOutcome, SyncRequest, SyncResult, SyncTask,
};
use crate::config::SyncSettings;
use crate::db::{EntityRepository, SqliteEntityRepository};
use crate::models::{ChangeAware, Entity, LastSyncTime, Pledge};
use crate::services::StoreService;

/// First part of every pledge sync key
pub const SYNC_PLEDGES: &str = "pledges";

/// Tally of one dirty push
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DirtySyncReport {
    pub pushed: usize,
    /// Records that could not be pushed yet (no account list)
    pub skipped: usize,
    /// Records the API refused or could not reach; they stay dirty
    pub failed: usize,
}

pub struct PledgesSyncService<A> {
    api: Arc<A>,
    store: StoreService,
    coordinator: DirtySyncCoordinator,
    settings: SyncSettings,
    dirty_lock: Arc<Mutex<()>>,
}

impl<A> Clone for PledgesSyncService<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            store: self.store.clone(),
            coordinator: self.coordinator.clone(),
            settings: self.settings.clone(),
            dirty_lock: Arc::clone(&self.dirty_lock),
        }
    }
}

impl<A: PledgeApi + 'static> PledgesSyncService<A> {
    pub fn new(api: Arc<A>, coordinator: DirtySyncCoordinator, settings: SyncSettings) -> Self {
        Self {
            api,
            store: coordinator.store().clone(),
            coordinator,
            settings,
            dirty_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Fetch every pledge of an appeal, unless they were fetched within the
    /// staleness window.
    ///
    /// Local edits survive the fetch. Pledges missing from the server are
    /// removed only when every page arrived.
    pub async fn sync_pledges(
        &self,
        account_list_id: &str,
        appeal_id: &str,
        forced: bool,
    ) -> SyncResult<SyncOutcome> {
        let key = LastSyncTime::key(&[SYNC_PLEDGES, appeal_id]);
        let request =
            SyncRequest::full(key, self.settings.pledges_stale_duration()).forced(forced);

        self.coordinator
            .run_sync(request, || self.fetch_and_save(account_list_id, appeal_id))
            .await
    }

    pub fn sync_pledges_task(
        &self,
        account_list_id: impl Into<String>,
        appeal_id: impl Into<String>,
        forced: bool,
    ) -> SyncTask {
        let service = self.clone();
        let account_list_id = account_list_id.into();
        let appeal_id = appeal_id.into();
        SyncTask::new(format!("{SYNC_PLEDGES} {appeal_id}"), async move {
            service
                .sync_pledges(&account_list_id, &appeal_id, forced)
                .await
                .map(|_| ())
        })
    }

    async fn fetch_and_save(&self, account_list_id: &str, appeal_id: &str) -> SyncResult<()> {
        let per_page = self.settings.page_size;
        let responses = fetch_pages(self.settings.page_limit(), |page| {
            self.api
                .get_pledges(account_list_id, appeal_id, page, per_page)
        })
        .await;

        let mut pledges = Vec::new();
        let mut first_error = None;
        for response in responses {
            match response {
                Ok(page) => pledges.extend(
                    page.data
                        .into_iter()
                        .map(|pledge| scoped(pledge, account_list_id, Some(appeal_id))),
                ),
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }

        let fetched = pledges.len();
        let clean = self
            .store
            .save_from_remote(pledges, Some(appeal_id), first_error.is_none())
            .await?;
        tracing::debug!(appeal_id, fetched, clean, "Saved pledges from server");

        first_error.map_or(Ok(()), |error| Err(error.into()))
    }

    /// Push every dirty pledge to the server, one at a time.
    ///
    /// API failures are logged and counted; the affected pledge stays dirty
    /// for the next run. Store failures abort the push.
    pub async fn sync_dirty_pledges(&self) -> SyncResult<DirtySyncReport> {
        let _guard = self.dirty_lock.lock().await;
        let dirty = self.store.list_dirty::<Pledge>().await?;
        let mut report = DirtySyncReport::default();

        for pledge in &dirty {
            match self.push_pledge(pledge).await {
                Ok(true) => report.pushed += 1,
                Ok(false) => report.skipped += 1,
                Err(SyncError::Api(error)) => {
                    log_push_failure(pledge, &error);
                    report.failed += 1;
                }
                Err(error) => return Err(error),
            }
        }

        if !dirty.is_empty() {
            tracing::info!(
                pushed = report.pushed,
                skipped = report.skipped,
                failed = report.failed,
                "Pushed dirty pledges"
            );
        }
        Ok(report)
    }

    pub fn sync_dirty_pledges_task(&self) -> SyncTask {
        let service = self.clone();
        SyncTask::new(format!("{SYNC_PLEDGES} dirty"), async move {
            service.sync_dirty_pledges().await.map(|_| ())
        })
    }

    async fn push_pledge(&self, pledge: &Pledge) -> SyncResult<bool> {
        if pledge.is_new() && pledge.is_deleted() {
            // never reached the server
            self.store.delete::<Pledge>(pledge.id()).await?;
            return Ok(true);
        }

        let Some(account_list_id) = pledge.account_list_id() else {
            tracing::debug!(id = pledge.id(), "Dirty pledge has no account list");
            return Ok(false);
        };

        if pledge.is_deleted() {
            self.push_delete(account_list_id, pledge).await?;
        } else if pledge.is_new() {
            self.push_create(account_list_id, pledge).await?;
        } else if pledge.has_changed_fields() {
            self.push_update(account_list_id, pledge).await?;
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    async fn push_delete(&self, account_list_id: &str, pledge: &Pledge) -> SyncResult<()> {
        match self.api.delete_pledge(account_list_id, pledge.id()).await {
            Ok(()) | Err(ApiError::NotFound(_)) => {}
            Err(error) => return Err(error.into()),
        }
        self.store.delete::<Pledge>(pledge.id()).await?;
        Ok(())
    }

    async fn push_create(&self, account_list_id: &str, pledge: &Pledge) -> SyncResult<()> {
        let created = self.api.create_pledge(account_list_id, pledge).await?;
        let created = scoped(created, account_list_id, pledge.appeal_id());

        self.store
            .transaction(|tx| {
                let repo = SqliteEntityRepository::new(tx);
                repo.clear_new_flag(pledge)?;
                if created.id() != pledge.id() {
                    repo.delete::<Pledge>(pledge.id())?;
                }
                repo.save_from_remote(vec![created], None, false)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn push_update(&self, account_list_id: &str, pledge: &Pledge) -> SyncResult<()> {
        let update = PartialUpdate::from_entity(pledge)?;
        let updated = self.api.update_pledge(account_list_id, &update).await?;
        let updated = scoped(updated, account_list_id, pledge.appeal_id());

        self.store
            .transaction(|tx| {
                let repo = SqliteEntityRepository::new(tx);
                repo.clear_changed_fields(pledge)?;
                repo.save_from_remote(vec![updated], None, false)?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// Fill in the scope the server leaves implicit in nested responses.
fn scoped(mut pledge: Pledge, account_list_id: &str, appeal_id: Option<&str>) -> Pledge {
    if pledge.appeal_id().is_none() {
        pledge.set_appeal_id(appeal_id.map(str::to_string));
    }
    if pledge.account_list_id().is_none() {
        pledge = pledge.in_account_list(account_list_id);
    }
    pledge
}

fn log_push_failure(pledge: &Pledge, error: &ApiError) {
    if error.is_transient() || error.is_server_error() {
        tracing::debug!(id = pledge.id(), %error, "Pledge push failed, will retry");
    } else {
        tracing::error!(id = pledge.id(), %error, "Pledge push rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PledgeStatus;
    use crate::sync::{Page, SyncTracker};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory stand-in for the pledges endpoints.
    #[derive(Default)]
    struct FakePledgeApi {
        remote: std::sync::Mutex<Vec<Pledge>>,
        failing_pages: std::sync::Mutex<HashSet<u32>>,
        offline: AtomicBool,
        updates: std::sync::Mutex<Vec<PartialUpdate>>,
    }

    /// What the server would send back: same attributes, clean change state.
    fn server_copy(pledge: &Pledge) -> Pledge {
        serde_json::from_value(serde_json::to_value(pledge).unwrap()).unwrap()
    }

    impl FakePledgeApi {
        fn with_remote(pledges: Vec<Pledge>) -> Self {
            let api = Self::default();
            *api.remote.lock().unwrap() = pledges;
            api
        }

        fn remote_ids(&self) -> Vec<String> {
            let mut ids: Vec<_> = self
                .remote
                .lock()
                .unwrap()
                .iter()
                .map(|pledge| pledge.id().to_string())
                .collect();
            ids.sort();
            ids
        }

        fn check_online(&self) -> Result<(), ApiError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(ApiError::Transient("offline".to_string()));
            }
            Ok(())
        }
    }

    impl PledgeApi for FakePledgeApi {
        async fn get_pledges(
            &self,
            _account_list_id: &str,
            appeal_id: &str,
            page: u32,
            per_page: u32,
        ) -> Result<Page<Pledge>, ApiError> {
            self.check_online()?;
            if self.failing_pages.lock().unwrap().contains(&page) {
                return Err(ApiError::Transient(format!("page {page} timed out")));
            }

            let matching: Vec<Pledge> = self
                .remote
                .lock()
                .unwrap()
                .iter()
                .filter(|pledge| pledge.appeal_id() == Some(appeal_id))
                .map(server_copy)
                .collect();
            let per_page = per_page as usize;
            let total_pages = matching.len().div_ceil(per_page).max(1);
            let data = matching
                .into_iter()
                .skip((page as usize - 1) * per_page)
                .take(per_page)
                .collect();
            Ok(Page::new(data, u32::try_from(total_pages).unwrap()))
        }

        async fn create_pledge(
            &self,
            _account_list_id: &str,
            pledge: &Pledge,
        ) -> Result<Pledge, ApiError> {
            self.check_online()?;
            let mut created = server_copy(pledge);
            created.set_updated_in_db_at(Some(chrono::Utc::now()));
            self.remote.lock().unwrap().push(created.clone());
            Ok(created)
        }

        async fn update_pledge(
            &self,
            _account_list_id: &str,
            update: &PartialUpdate,
        ) -> Result<Pledge, ApiError> {
            self.check_online()?;
            self.updates.lock().unwrap().push(update.clone());

            let mut remote = self.remote.lock().unwrap();
            let Some(stored) = remote.iter_mut().find(|pledge| pledge.id() == update.id) else {
                return Err(ApiError::NotFound(update.id.clone()));
            };
            let mut value = serde_json::to_value(&*stored).unwrap();
            for (name, attribute) in &update.attributes {
                value[name] = attribute.clone();
            }
            *stored = serde_json::from_value(value).unwrap();
            Ok(server_copy(stored))
        }

        async fn delete_pledge(
            &self,
            _account_list_id: &str,
            pledge_id: &str,
        ) -> Result<(), ApiError> {
            self.check_online()?;
            let mut remote = self.remote.lock().unwrap();
            let before = remote.len();
            remote.retain(|pledge| pledge.id() != pledge_id);
            if remote.len() == before {
                return Err(ApiError::NotFound(format!("Couldn't find Pledge {pledge_id}")));
            }
            Ok(())
        }
    }

    fn remote_pledge(id: &str, appeal_id: &str, amount: f64) -> Pledge {
        let mut pledge = Pledge::with_id(id).in_account_list("acc");
        pledge.set_appeal_id(Some(appeal_id.to_string()));
        pledge.set_amount(Some(amount));
        pledge
    }

    fn setup(
        api: FakePledgeApi,
        page_size: u32,
    ) -> (PledgesSyncService<FakePledgeApi>, Arc<FakePledgeApi>) {
        let api = Arc::new(api);
        let store = StoreService::open_in_memory().unwrap();
        let settings = SyncSettings {
            page_size,
            ..SyncSettings::default()
        };
        let service =
            PledgesSyncService::new(Arc::clone(&api), DirtySyncCoordinator::new(store), settings);
        (service, api)
    }

    async fn stored_ids(service: &PledgesSyncService<FakePledgeApi>) -> Vec<String> {
        service
            .store
            .list::<Pledge>(true)
            .await
            .unwrap()
            .iter()
            .map(|pledge| pledge.id().to_string())
            .collect()
    }

    #[tokio::test]
    async fn sync_pledges_fetches_every_page_once_per_window() {
        let (service, api) = setup(
            FakePledgeApi::with_remote(vec![
                remote_pledge("p1", "a1", 10.0),
                remote_pledge("p2", "a1", 20.0),
                remote_pledge("p3", "a1", 30.0),
                remote_pledge("p4", "a2", 40.0),
            ]),
            2,
        );

        let outcome = service.sync_pledges("acc", "a1", false).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Synced);
        assert_eq!(stored_ids(&service).await, vec!["p1", "p2", "p3"]);

        let last = service.store.last_sync_time("pledges|a1").await.unwrap();
        assert!(last.last_full_sync().is_some());

        api.remote.lock().unwrap().push(remote_pledge("p5", "a1", 50.0));
        let outcome = service.sync_pledges("acc", "a1", false).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped);
        assert_eq!(stored_ids(&service).await.len(), 3);

        let outcome = service.sync_pledges("acc", "a1", true).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Synced);
        assert_eq!(stored_ids(&service).await.len(), 4);
    }

    #[tokio::test]
    async fn sync_pledges_removes_orphans_but_keeps_unsynced() {
        let (service, _api) = setup(
            FakePledgeApi::with_remote(vec![remote_pledge("p1", "a1", 10.0)]),
            100,
        );
        service.store.save(&remote_pledge("gone", "a1", 5.0)).await.unwrap();
        let unsynced = Pledge::new_local("acc", "a1", "c1");
        service.store.save(&unsynced).await.unwrap();

        service.sync_pledges("acc", "a1", false).await.unwrap();

        let mut expected = vec!["p1".to_string(), unsynced.id().to_string()];
        expected.sort();
        assert_eq!(stored_ids(&service).await, expected);
    }

    #[tokio::test]
    async fn failed_page_keeps_orphans_and_records_partial_sync() {
        let (service, api) = setup(
            FakePledgeApi::with_remote(vec![
                remote_pledge("p1", "a1", 10.0),
                remote_pledge("p2", "a1", 20.0),
            ]),
            1,
        );
        api.failing_pages.lock().unwrap().insert(2);
        service.store.save(&remote_pledge("orphan", "a1", 5.0)).await.unwrap();

        let outcome = service.sync_pledges("acc", "a1", false).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Failed);
        assert_eq!(stored_ids(&service).await, vec!["orphan", "p1"]);

        let last = service.store.last_sync_time("pledges|a1").await.unwrap();
        assert!(last.last_sync().is_some());
        assert!(last.last_full_sync().is_none());
    }

    #[tokio::test]
    async fn fetch_keeps_local_edits() {
        let (service, _api) = setup(
            FakePledgeApi::with_remote(vec![remote_pledge("p1", "a1", 10.0)]),
            100,
        );
        let mut local = remote_pledge("p1", "a1", 10.0);
        local.set_tracking_changes(true);
        local.set_amount(Some(99.0));
        service.store.save(&local).await.unwrap();

        service.sync_pledges("acc", "a1", false).await.unwrap();

        let stored: Pledge = service.store.get("p1").await.unwrap().unwrap();
        assert_eq!(stored.amount(), Some(99.0));
        assert!(stored.changed_fields().contains(Pledge::FIELD_AMOUNT));
    }

    #[tokio::test]
    async fn dirty_push_creates_new_pledges() {
        let (service, api) = setup(FakePledgeApi::default(), 100);
        let mut pledge = Pledge::new_local("acc", "a1", "c1");
        pledge.set_tracking_changes(true);
        pledge.set_amount(Some(25.0));
        pledge.set_status(Some(PledgeStatus::NotReceived));
        service.store.save(&pledge).await.unwrap();

        let report = service.sync_dirty_pledges().await.unwrap();
        assert_eq!(
            report,
            DirtySyncReport {
                pushed: 1,
                ..DirtySyncReport::default()
            }
        );
        assert_eq!(api.remote_ids(), vec![pledge.id().to_string()]);

        let stored: Pledge = service.store.get(pledge.id()).await.unwrap().unwrap();
        assert!(!stored.is_dirty());
        assert!(stored.updated_in_db_at().is_some());
    }

    #[tokio::test]
    async fn dirty_push_sends_only_changed_fields() {
        let (service, api) = setup(
            FakePledgeApi::with_remote(vec![remote_pledge("p1", "a1", 10.0)]),
            100,
        );
        let mut local = remote_pledge("p1", "a1", 10.0);
        local.set_tracking_changes(true);
        local.set_status(Some(PledgeStatus::Processed));
        service.store.save(&local).await.unwrap();

        let report = service.sync_dirty_pledges().await.unwrap();
        assert_eq!(report.pushed, 1);

        let updates = api.updates.lock().unwrap().clone();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].contains(Pledge::FIELD_STATUS));
        assert!(!updates[0].contains(Pledge::FIELD_AMOUNT));

        let stored: Pledge = service.store.get("p1").await.unwrap().unwrap();
        assert!(!stored.is_dirty());
        assert_eq!(stored.status(), Some(PledgeStatus::Processed));
    }

    #[tokio::test]
    async fn dirty_push_deletes_remote_and_local() {
        let (service, api) = setup(
            FakePledgeApi::with_remote(vec![remote_pledge("p1", "a1", 10.0)]),
            100,
        );
        service.store.save(&remote_pledge("p1", "a1", 10.0)).await.unwrap();
        service.store.save(&remote_pledge("ghost", "a1", 1.0)).await.unwrap();
        service.store.mark_deleted::<Pledge>("p1").await.unwrap();
        service.store.mark_deleted::<Pledge>("ghost").await.unwrap();

        let report = service.sync_dirty_pledges().await.unwrap();
        assert_eq!(report.pushed, 2);
        assert!(api.remote_ids().is_empty());
        // "ghost" was already gone remotely; the local copy goes too
        assert!(stored_ids(&service).await.is_empty());
    }

    #[tokio::test]
    async fn dirty_push_keeps_records_dirty_when_offline() {
        let (service, api) = setup(FakePledgeApi::default(), 100);
        api.offline.store(true, Ordering::SeqCst);
        let pledge = Pledge::new_local("acc", "a1", "c1");
        service.store.save(&pledge).await.unwrap();

        let mut orphaned = Pledge::with_id("no-account");
        orphaned.set_new(true);
        service.store.save(&orphaned).await.unwrap();

        let report = service.sync_dirty_pledges().await.unwrap();
        assert_eq!(
            report,
            DirtySyncReport {
                pushed: 0,
                skipped: 1,
                failed: 1,
            }
        );
        assert_eq!(service.store.list_dirty::<Pledge>().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn deleting_an_unpushed_pledge_never_calls_the_api() {
        let (service, api) = setup(FakePledgeApi::default(), 100);
        api.offline.store(true, Ordering::SeqCst);
        let pledge = Pledge::new_local("acc", "a1", "c1");
        service.store.save(&pledge).await.unwrap();
        service.store.mark_deleted::<Pledge>(pledge.id()).await.unwrap();

        let report = service.sync_dirty_pledges().await.unwrap();
        assert_eq!(report.pushed, 1);
        assert!(stored_ids(&service).await.is_empty());
    }

    #[tokio::test]
    async fn tasks_run_through_the_tracker() {
        let (service, _api) = setup(
            FakePledgeApi::with_remote(vec![remote_pledge("p1", "a1", 10.0)]),
            100,
        );
        service.store.save(&Pledge::new_local("acc", "a2", "c1")).await.unwrap();

        let tracker = SyncTracker::new();
        tracker
            .run_sync_tasks(vec![
                service.sync_pledges_task("acc", "a1", false),
                service.sync_dirty_pledges_task(),
            ])
            .await
            .unwrap();

        assert!(tracker.initial_sync_finished());
        assert!(!tracker.is_syncing());
        assert!(service.store.get::<Pledge>("p1").await.unwrap().is_some());
        assert!(service.store.list_dirty::<Pledge>().await.unwrap().is_empty());
    }
}
