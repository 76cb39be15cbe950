//! Pre-wired orchestrator over in-memory providers.
//!
//! The seeded world:
//!
//! ```text
//! owner         owns profile P1
//! venue_owner   holds a grant on venue V1
//! worker        owns profile P2, which works at V1
//! admin         administrator
//! verifier      service principal (instant-payment verifier)
//! stranger      linked to nothing
//! ```

use crate::test_clock;
use entitlements_core::mocks::{
    FixedClock, InMemoryEntitlements, MockOwnershipDirectory, MockQrService,
    RecordingNotificationSink,
};
use entitlements_core::{
    EntityId, EntityRef, LifecycleEnvironment, LifecycleOrchestrator, OwnershipVerifier,
    PaymentMethod, PricingCatalog, Principal, PrincipalId, Purchase, PurchaseRequest, Result,
    Role, Tier,
};
use std::sync::Arc;

/// Orchestrator plus handles on every mock behind it.
#[derive(Clone)]
pub struct TestHarness {
    /// System under test
    pub orchestrator: LifecycleOrchestrator,
    /// Store and ledger
    pub entitlements: Arc<InMemoryEntitlements>,
    /// Captured notifications
    pub notifier: Arc<RecordingNotificationSink>,
    /// QR collaborator
    pub qr: Arc<MockQrService>,
    /// Shared clock
    pub clock: Arc<FixedClock>,

    /// Owns P1
    pub owner: Principal,
    /// Holds the V1 grant
    pub venue_owner: Principal,
    /// Owns P2
    pub worker: Principal,
    /// Administrator
    pub admin: Principal,
    /// Service principal
    pub verifier: Principal,
    /// No linkage
    pub stranger: Principal,

    /// Profile owned by `owner`
    pub p1: EntityId,
    /// Profile owned by `worker`, working at V1
    pub p2: EntityId,
    /// Venue granted to `venue_owner`
    pub v1: EntityId,
}

impl TestHarness {
    /// Harness with a configured QR collaborator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_qr(MockQrService::configured())
    }

    /// Harness with the given QR collaborator.
    #[must_use]
    pub fn with_qr(qr: MockQrService) -> Self {
        let owner = Principal::member(PrincipalId::new());
        let venue_owner = Principal::member(PrincipalId::new());
        let worker = Principal::member(PrincipalId::new());
        let admin = Principal::admin(PrincipalId::new());
        let verifier = Principal {
            id: PrincipalId::new(),
            role: Role::Service,
        };
        let stranger = Principal::member(PrincipalId::new());

        let p1 = EntityId::new();
        let p2 = EntityId::new();
        let v1 = EntityId::new();

        let directory = MockOwnershipDirectory::new()
            .with_profile(p1, owner.id)
            .with_profile(p2, worker.id)
            .with_workplace(p2, v1)
            .with_venue_grant(v1, venue_owner.id);

        let entitlements = Arc::new(InMemoryEntitlements::new());
        let notifier = Arc::new(RecordingNotificationSink::new());
        let qr = Arc::new(qr);
        let clock = Arc::new(test_clock());

        let orchestrator = LifecycleOrchestrator::new(LifecycleEnvironment {
            store: entitlements.clone(),
            ledger: entitlements.clone(),
            verifier: OwnershipVerifier::standard(Arc::new(directory)),
            catalog: PricingCatalog::default(),
            qr: qr.clone(),
            notifier: notifier.clone(),
            clock: clock.clone(),
        });

        Self {
            orchestrator,
            entitlements,
            notifier,
            qr,
            clock,
            owner,
            venue_owner,
            worker,
            admin,
            verifier,
            stranger,
            p1,
            p2,
            v1,
        }
    }

    /// `owner` buys the short tier for P1.
    ///
    /// # Errors
    ///
    /// Whatever the orchestrator returns.
    pub async fn purchase_p1(&self, method: PaymentMethod) -> Result<Purchase> {
        self.orchestrator
            .purchase(
                &self.owner,
                PurchaseRequest {
                    entity: EntityRef::profile(self.p1),
                    tier: Tier::Short,
                    method,
                },
            )
            .await
    }

    /// `owner` buys P1 with cash and `admin` verifies it.
    ///
    /// # Errors
    ///
    /// Whatever the orchestrator returns.
    pub async fn active_p1(&self) -> Result<Purchase> {
        let purchase = self.purchase_p1(PaymentMethod::ManualCash).await?;
        let settlement = self
            .orchestrator
            .confirm_manual(&self.admin, purchase.transaction.id, None)
            .await?;

        Ok(Purchase {
            subscription: settlement.subscription.unwrap_or(purchase.subscription),
            transaction: settlement.transaction,
        })
    }

    /// The live (pending or active) subscriptions currently stored for `entity`.
    #[must_use]
    pub fn live_count(&self, entity: EntityRef) -> usize {
        self.entitlements
            .subscriptions()
            .iter()
            .filter(|s| s.entity() == entity && s.status.is_live())
            .count()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
