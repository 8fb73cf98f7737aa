//! End-to-end registration flows over loopback transports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use proptest::prelude::*;
use serde_json::json;
use tokio::sync::mpsc;

use subastas_core::{
    FormField, FormInput, RegistrationError, RegistrationOutcome, Role, SubmissionState,
};
use subastas_session::{
    AuctionFloorRoute, ChannelRouter, IdentityIssuer, LiveRegistrationTransport,
    RegistrationCoordinator, ResponseCorrelator, SubmitOutcome,
};
use subastas_store::{KeyValueStore, MemoryKeyValueStore, StoreError};
use subastas_transport::testing::{LoopbackGateway, ScriptedAdminTransport};

const REPLY_CHANNEL: &str = "user_registered";

struct Flow {
    coordinator: Arc<RegistrationCoordinator>,
    gateway: Arc<LoopbackGateway>,
    admin: Arc<ScriptedAdminTransport>,
    store: Arc<MemoryKeyValueStore>,
    routes: mpsc::UnboundedReceiver<AuctionFloorRoute>,
}

fn flow(connected: bool, reply_timeout: Option<Duration>) -> Flow {
    let gateway = Arc::new(LoopbackGateway::new(connected));
    let admin = Arc::new(ScriptedAdminTransport::new());
    let store = Arc::new(MemoryKeyValueStore::new());
    let correlator = ResponseCorrelator::new(gateway.clone(), reply_timeout);
    let transport = Arc::new(LiveRegistrationTransport::new(
        gateway.clone(),
        correlator,
        admin.clone(),
    ));
    let (router, routes) = ChannelRouter::channel();
    let coordinator = Arc::new(RegistrationCoordinator::new(
        IdentityIssuer::new(store.clone()),
        transport,
        Arc::new(router),
    ));
    Flow {
        coordinator,
        gateway,
        admin,
        store,
        routes,
    }
}

fn bidder_form() -> FormInput {
    FormInput::new()
        .with(FormField::Name, "Ana")
        .with(FormField::Surname, "García")
}

fn manager_form() -> FormInput {
    FormInput::new()
        .with(FormField::Username, "admin")
        .with(FormField::Password, "s3cret")
}

fn spawn_submit(
    coordinator: &Arc<RegistrationCoordinator>,
    form: FormInput,
) -> tokio::task::JoinHandle<Result<SubmitOutcome, RegistrationError>> {
    let coordinator = Arc::clone(coordinator);
    tokio::spawn(async move { coordinator.submit(&form).await })
}

async fn wait_for_sends(gateway: &LoopbackGateway, count: usize) {
    while gateway.sent_count() < count {
        tokio::task::yield_now().await;
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bidder_accepted_navigates_with_issued_identity() {
    let mut f = flow(true, None);
    f.gateway.reply_on_send(REPLY_CHANNEL, json!({"success": true}));
    assert!(f.coordinator.select_role(Role::Bidder));

    let outcome = f.coordinator.submit(&bidder_form()).await.unwrap();
    let SubmitOutcome::Succeeded(identity) = outcome else {
        panic!("expected success, got {outcome:?}");
    };

    assert_eq!(f.coordinator.snapshot().state, SubmissionState::Succeeded);
    let route = f.routes.try_recv().unwrap();
    assert_eq!(route.identity(), &identity);
    assert_eq!(route.path(), format!("/auctions?userId={identity}"));
    assert_eq!(
        f.store.get("userId").unwrap().as_deref(),
        Some(identity.as_str())
    );
    assert_eq!(f.gateway.sent()[0].1["userId"], json!(identity.as_str()));
    assert!(f.routes.try_recv().is_err());
}

#[tokio::test]
async fn bidder_rejected_shows_server_message() {
    let mut f = flow(true, None);
    f.gateway.reply_on_send(
        REPLY_CHANNEL,
        json!({"success": false, "message": "Usuario ya existe"}),
    );
    let _ = f.coordinator.select_role(Role::Bidder);

    let err = f.coordinator.submit(&bidder_form()).await.unwrap_err();
    assert_eq!(
        err,
        RegistrationError::ServerRejected(Some("Usuario ya existe".into()))
    );
    let view = f.coordinator.snapshot();
    assert_eq!(view.state, SubmissionState::Failed);
    assert_eq!(view.message.as_deref(), Some("Usuario ya existe"));
    assert!(f.routes.try_recv().is_err());
}

#[tokio::test]
async fn manager_accepted_navigates() {
    let mut f = flow(true, None);
    f.admin.push_outcome(RegistrationOutcome::accepted());
    let _ = f.coordinator.select_role(Role::Manager);

    let outcome = f.coordinator.submit(&manager_form()).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Succeeded(_)));
    assert_eq!(f.admin.call_count(), 1);
    assert_eq!(f.gateway.sent_count(), 0);
    assert!(f.routes.try_recv().is_ok());
}

#[tokio::test]
async fn no_role_is_rejected_without_network_activity() {
    let mut f = flow(true, None);

    let err = f.coordinator.submit(&bidder_form()).await.unwrap_err();
    assert_eq!(err, RegistrationError::NoRoleSelected);

    let view = f.coordinator.snapshot();
    assert_eq!(view.state, SubmissionState::Idle);
    assert_eq!(
        view.message.as_deref(),
        Some("Por favor seleccione un rol antes de continuar.")
    );
    assert_eq!(f.gateway.sent_count(), 0);
    assert_eq!(f.admin.call_count(), 0);
    assert_eq!(f.store.write_count(), 0);
    assert!(f.routes.try_recv().is_err());
}

#[tokio::test]
async fn bidder_without_connection_is_rejected_locally() {
    let mut f = flow(false, None);
    let _ = f.coordinator.select_role(Role::Bidder);

    let err = f.coordinator.submit(&bidder_form()).await.unwrap_err();
    assert_eq!(err, RegistrationError::ConnectionUnavailable);

    let view = f.coordinator.snapshot();
    assert_eq!(view.state, SubmissionState::RoleSelected);
    assert_eq!(
        view.message.as_deref(),
        Some("Error: No se pudo conectar al servidor.")
    );
    assert_eq!(f.gateway.sent_count(), 0);
    assert_eq!(f.store.write_count(), 0);
    assert_eq!(f.gateway.subscriber_count(REPLY_CHANNEL), 0);
    assert!(f.routes.try_recv().is_err());
}

// ── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn resubmit_while_submitting_is_ignored() {
    let mut f = flow(true, None);
    let _ = f.coordinator.select_role(Role::Bidder);

    let first = spawn_submit(&f.coordinator, bidder_form());
    wait_for_sends(&f.gateway, 1).await;
    let view = f.coordinator.snapshot();
    assert!(view.loading);
    assert_eq!(view.submit_label(), "Procesando...");

    let second = f.coordinator.submit(&bidder_form()).await.unwrap();
    assert_eq!(second, SubmitOutcome::Ignored);
    assert_eq!(f.gateway.sent_count(), 1);
    assert_eq!(f.store.write_count(), 1);
    assert_eq!(f.gateway.subscriber_count(REPLY_CHANNEL), 1);

    assert_eq!(f.gateway.deliver(REPLY_CHANNEL, json!({"success": true})), 1);
    assert!(matches!(
        first.await.unwrap().unwrap(),
        SubmitOutcome::Succeeded(_)
    ));
    assert!(f.routes.try_recv().is_ok());
    assert!(f.routes.try_recv().is_err());
}

#[tokio::test]
async fn cancelled_submission_discards_late_reply() {
    let mut f = flow(true, None);
    let _ = f.coordinator.select_role(Role::Bidder);

    let task = spawn_submit(&f.coordinator, bidder_form());
    wait_for_sends(&f.gateway, 1).await;
    f.coordinator.cancel();

    assert_eq!(task.await.unwrap().unwrap(), SubmitOutcome::Cancelled);
    assert_eq!(f.gateway.deliver(REPLY_CHANNEL, json!({"success": true})), 0);

    let view = f.coordinator.snapshot();
    assert_eq!(view.state, SubmissionState::RoleSelected);
    assert!(!view.loading);
    assert!(f.routes.try_recv().is_err());
}

#[tokio::test]
async fn resubmit_after_cancel_uses_single_listener() {
    let f = flow(true, None);
    let _ = f.coordinator.select_role(Role::Bidder);

    let first = spawn_submit(&f.coordinator, bidder_form());
    wait_for_sends(&f.gateway, 1).await;
    f.coordinator.cancel();
    let _ = first.await.unwrap();

    let second = spawn_submit(&f.coordinator, bidder_form());
    wait_for_sends(&f.gateway, 2).await;
    assert_eq!(f.gateway.subscriber_count(REPLY_CHANNEL), 1);

    let _ = f.gateway.deliver(REPLY_CHANNEL, json!({"success": true}));
    assert!(matches!(
        second.await.unwrap().unwrap(),
        SubmitOutcome::Succeeded(_)
    ));
    assert_eq!(f.gateway.subscriber_count(REPLY_CHANNEL), 0);
}

#[tokio::test]
async fn connection_drop_while_waiting_fails_submission() {
    let mut f = flow(true, None);
    let _ = f.coordinator.select_role(Role::Bidder);

    let task = spawn_submit(&f.coordinator, bidder_form());
    wait_for_sends(&f.gateway, 1).await;
    f.gateway.set_connected(false);

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err, RegistrationError::ConnectionLost);
    let view = f.coordinator.snapshot();
    assert_eq!(view.state, SubmissionState::Failed);
    assert_eq!(
        view.message.as_deref(),
        Some("Error: Se perdió la conexión con el servidor.")
    );
    assert_eq!(f.gateway.subscriber_count(REPLY_CHANNEL), 0);
    assert!(f.routes.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn silent_server_times_out_as_connection_lost() {
    let f = flow(true, Some(Duration::from_secs(30)));
    let _ = f.coordinator.select_role(Role::Bidder);

    let err = f.coordinator.submit(&bidder_form()).await.unwrap_err();
    assert_eq!(err, RegistrationError::ConnectionLost);
    assert_eq!(f.coordinator.snapshot().state, SubmissionState::Failed);
    assert_eq!(f.gateway.subscriber_count(REPLY_CHANNEL), 0);
}

#[tokio::test]
async fn teardown_during_admin_call_discards_outcome() {
    let mut f = flow(true, None);
    let release = f.admin.push_deferred();
    let _ = f.coordinator.select_role(Role::Manager);

    let task = spawn_submit(&f.coordinator, manager_form());
    while f.admin.call_count() == 0 {
        tokio::task::yield_now().await;
    }
    f.coordinator.teardown();
    let _ = release.send(Ok(RegistrationOutcome::accepted()));

    assert_eq!(task.await.unwrap().unwrap(), SubmitOutcome::Cancelled);
    assert!(f.routes.try_recv().is_err());
    assert_eq!(
        f.coordinator.submit(&manager_form()).await.unwrap(),
        SubmitOutcome::Ignored
    );
}

#[tokio::test]
async fn malformed_reply_counts_as_rejection() {
    let f = flow(true, None);
    f.gateway.reply_on_send(REPLY_CHANNEL, json!("ok"));
    let _ = f.coordinator.select_role(Role::Bidder);

    let err = f.coordinator.submit(&bidder_form()).await.unwrap_err();
    assert_eq!(err, RegistrationError::ServerRejected(None));
    assert_eq!(
        f.coordinator.snapshot().message.as_deref(),
        Some("Error al procesar la solicitud.")
    );
}

// ── Cancellation before dispatch ────────────────────────────────────────────

/// Cancels the coordinator from inside its first write, after the identity
/// is issued and before any transport sees the attempt.
#[derive(Default)]
struct CancelOnFirstWrite {
    inner: MemoryKeyValueStore,
    coordinator: OnceLock<Weak<RegistrationCoordinator>>,
    fired: AtomicBool,
}

impl KeyValueStore for CancelOnFirstWrite {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value)?;
        if !self.fired.swap(true, Ordering::SeqCst) {
            if let Some(coordinator) = self.coordinator.get().and_then(Weak::upgrade) {
                coordinator.cancel();
            }
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.remove(key)
    }
}

fn cancelling_flow() -> (Flow, Arc<CancelOnFirstWrite>) {
    let gateway = Arc::new(LoopbackGateway::new(true));
    let admin = Arc::new(ScriptedAdminTransport::new());
    let store = Arc::new(CancelOnFirstWrite::default());
    let correlator = ResponseCorrelator::new(gateway.clone(), None);
    let transport = Arc::new(LiveRegistrationTransport::new(
        gateway.clone(),
        correlator,
        admin.clone(),
    ));
    let (router, routes) = ChannelRouter::channel();
    let coordinator = Arc::new(RegistrationCoordinator::new(
        IdentityIssuer::new(store.clone()),
        transport,
        Arc::new(router),
    ));
    let _ = store.coordinator.set(Arc::downgrade(&coordinator));
    let flow = Flow {
        coordinator,
        gateway,
        admin,
        store: Arc::new(MemoryKeyValueStore::new()),
        routes,
    };
    (flow, store)
}

#[tokio::test]
async fn cancel_before_admin_dispatch_leaves_single_attempt_in_flight() {
    let (f, store) = cancelling_flow();
    let _release = f.admin.push_deferred();
    let _ = f.coordinator.select_role(Role::Manager);

    assert_eq!(
        f.coordinator.submit(&manager_form()).await.unwrap(),
        SubmitOutcome::Cancelled
    );
    assert_eq!(f.admin.call_count(), 0);
    assert_eq!(f.coordinator.snapshot().state, SubmissionState::RoleSelected);
    assert_eq!(store.inner.write_count(), 1);

    let task = spawn_submit(&f.coordinator, manager_form());
    while f.admin.call_count() == 0 {
        tokio::task::yield_now().await;
    }
    f.coordinator.cancel();
    assert_eq!(task.await.unwrap().unwrap(), SubmitOutcome::Cancelled);
    assert_eq!(f.admin.call_count(), 1);
    assert_eq!(f.coordinator.snapshot().state, SubmissionState::RoleSelected);
}

#[tokio::test]
async fn cancel_before_bidder_dispatch_sends_nothing() {
    let (mut f, _store) = cancelling_flow();
    f.gateway.reply_on_send(REPLY_CHANNEL, json!({"success": true}));
    let _ = f.coordinator.select_role(Role::Bidder);

    assert_eq!(
        f.coordinator.submit(&bidder_form()).await.unwrap(),
        SubmitOutcome::Cancelled
    );
    assert_eq!(f.gateway.sent_count(), 0);
    assert_eq!(f.gateway.subscriber_count(REPLY_CHANNEL), 0);

    let outcome = f.coordinator.submit(&bidder_form()).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Succeeded(_)));
    assert_eq!(f.gateway.sent_count(), 1);
    assert!(f.routes.try_recv().is_ok());
    assert!(f.routes.try_recv().is_err());
}

// ── Listener bound ──────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
enum Op {
    Submit,
    Reply(bool),
    Cancel,
    SelectRole,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Submit),
        2 => any::<bool>().prop_map(Op::Reply),
        1 => Just(Op::Cancel),
        1 => Just(Op::SelectRole),
    ]
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn never_more_than_one_reply_listener(ops in prop::collection::vec(op(), 1..24)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let f = flow(true, None);
            let _ = f.coordinator.select_role(Role::Bidder);
            let mut tasks = Vec::new();

            for op in ops {
                match op {
                    Op::Submit => tasks.push(spawn_submit(&f.coordinator, bidder_form())),
                    Op::Reply(success) => {
                        let _ = f.gateway.deliver(REPLY_CHANNEL, json!({"success": success}));
                    }
                    Op::Cancel => f.coordinator.cancel(),
                    Op::SelectRole => {
                        let _ = f.coordinator.select_role(Role::Bidder);
                    }
                }
                settle().await;
                prop_assert!(f.gateway.subscriber_count(REPLY_CHANNEL) <= 1);
                // One send per issued identity; ignored submits issue nothing.
                prop_assert_eq!(f.gateway.sent_count(), f.store.write_count());
            }

            f.coordinator.teardown();
            for task in tasks {
                let _ = task.await;
            }
            prop_assert_eq!(f.gateway.subscriber_count(REPLY_CHANNEL), 0);
            Ok(())
        })?;
    }
}
