//! Domain types for the entitlement engine.
//!
//! Identifiers, the closed enums that replace loosely-typed role and kind
//! strings, and the two persisted records: [`Subscription`] and
//! [`PaymentTransaction`].

use crate::error::EntitlementError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a subscription
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Creates a new random `SubscriptionId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `SubscriptionId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a payment transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Creates a new random `TransactionId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TransactionId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an authenticated caller (user account or service)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    /// Creates a new random `PrincipalId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `PrincipalId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a profile or venue record owned by the listings system
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new random `EntityId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EntityId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Closed enums
// ============================================================================

/// Kind of entity an entitlement can be sold to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A single person's profile (exactly one owning principal)
    Profile,
    /// A venue (any number of granted owners)
    Venue,
}

impl EntityKind {
    /// Every entity kind, in display order.
    pub const ALL: [Self; 2] = [Self::Profile, Self::Venue];

    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Venue => "venue",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = EntitlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile" => Ok(Self::Profile),
            "venue" => Ok(Self::Venue),
            other => Err(EntitlementError::invalid_input(format!(
                "unknown entity kind: {other}"
            ))),
        }
    }
}

/// A (kind, id) pair naming one entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity kind
    pub kind: EntityKind,
    /// Entity id
    pub id: EntityId,
}

impl EntityRef {
    /// Reference a profile.
    #[must_use]
    pub const fn profile(id: EntityId) -> Self {
        Self {
            kind: EntityKind::Profile,
            id,
        }
    }

    /// Reference a venue.
    #[must_use]
    pub const fn venue(id: EntityId) -> Self {
        Self {
            kind: EntityKind::Venue,
            id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Duration class of a VIP purchase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Shortest period
    Short,
    /// Middle period
    Medium,
    /// Longest period
    Long,
}

impl Tier {
    /// Every tier, shortest first.
    pub const ALL: [Self; 3] = [Self::Short, Self::Medium, Self::Long];

    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = EntitlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            other => Err(EntitlementError::invalid_input(format!("unknown tier: {other}"))),
        }
    }
}

/// Subscription lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Created, waiting for its transaction to settle
    PendingPayment,
    /// Paid and in force
    Active,
    /// Cancelled by an owner or administrator
    Cancelled,
    /// Payment rejected
    Failed,
    /// Past `expires_at`
    Expired,
}

impl SubscriptionStatus {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }

    /// Statuses that count against the one-live-subscription-per-entity rule.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::PendingPayment | Self::Active)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = EntitlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(Self::PendingPayment),
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            other => Err(EntitlementError::invalid_input(format!(
                "unknown subscription status: {other}"
            ))),
        }
    }
}

/// Settlement method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash handed over in person, attested by an administrator
    ManualCash,
    /// QR-code instant payment, verified out of band
    InstantQr,
}

impl PaymentMethod {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ManualCash => "manual_cash",
            Self::InstantQr => "instant_qr",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = EntitlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual_cash" => Ok(Self::ManualCash),
            "instant_qr" => Ok(Self::InstantQr),
            other => Err(EntitlementError::invalid_input(format!(
                "unknown payment method: {other}"
            ))),
        }
    }
}

/// Payment transaction status. `Completed` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting resolution
    Pending,
    /// Settled
    Completed,
    /// Rejected
    Failed,
}

impl PaymentStatus {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `true` once the transaction can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = EntitlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(EntitlementError::invalid_input(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// Caller role, resolved by the identity collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular account
    Member,
    /// Back-office administrator
    Admin,
    /// Machine caller (the instant-payment verifier)
    Service,
}

impl FromStr for Role {
    type Err = EntitlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            "service" => Ok(Self::Service),
            other => Err(EntitlementError::invalid_input(format!("unknown role: {other}"))),
        }
    }
}

/// Authenticated caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Caller id
    pub id: PrincipalId,
    /// Caller role
    pub role: Role,
}

impl Principal {
    /// A regular account.
    #[must_use]
    pub const fn member(id: PrincipalId) -> Self {
        Self {
            id,
            role: Role::Member,
        }
    }

    /// An administrator.
    #[must_use]
    pub const fn admin(id: PrincipalId) -> Self {
        Self {
            id,
            role: Role::Admin,
        }
    }

    /// Returns `true` for administrators.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Returns `true` for callers allowed to settle instant payments.
    #[must_use]
    pub const fn can_settle(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Service)
    }
}

// ============================================================================
// Records
// ============================================================================

/// A VIP entitlement for one entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription id
    pub id: SubscriptionId,
    /// Kind of the entitled entity
    pub entity_kind: EntityKind,
    /// Id of the entitled entity
    pub entity_id: EntityId,
    /// Purchased tier
    pub tier: Tier,
    /// Stored status (see [`Subscription::effective_status`])
    pub status: SubscriptionStatus,
    /// Purchase instant
    pub starts_at: DateTime<Utc>,
    /// `starts_at + tier duration`, fixed at creation
    pub expires_at: DateTime<Utc>,
    /// Catalog price at purchase time
    pub price_paid: i64,
    /// Currency of `price_paid`
    pub currency: String,
    /// Settling transaction, linked after it is created
    pub transaction_id: Option<TransactionId>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// The entity this subscription belongs to.
    #[must_use]
    pub const fn entity(&self) -> EntityRef {
        EntityRef {
            kind: self.entity_kind,
            id: self.entity_id,
        }
    }

    /// Status as observed at `now`: an active subscription past its
    /// expiry reads as `Expired` even before any sweep has run.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        if self.status == SubscriptionStatus::Active && now > self.expires_at {
            SubscriptionStatus::Expired
        } else {
            self.status
        }
    }

    /// Whether the entity currently enjoys the VIP boost.
    #[must_use]
    pub fn is_vip(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == SubscriptionStatus::Active
    }
}

/// A subscription together with its read-time status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubscriptionView {
    /// Stored record
    #[serde(flatten)]
    pub subscription: Subscription,
    /// Status after applying read-time expiry
    pub effective_status: SubscriptionStatus,
}

impl SubscriptionView {
    /// Build a view as of `now`.
    #[must_use]
    pub fn at(subscription: Subscription, now: DateTime<Utc>) -> Self {
        let effective_status = subscription.effective_status(now);
        Self {
            subscription,
            effective_status,
        }
    }
}

/// One settlement attempt backing one subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    /// Transaction id
    pub id: TransactionId,
    /// Owning subscription
    pub subscription_id: SubscriptionId,
    /// Amount due
    pub amount: i64,
    /// Currency of `amount`
    pub currency: String,
    /// Settlement method
    pub method: PaymentMethod,
    /// Resolution status
    pub payment_status: PaymentStatus,
    /// QR payload to render (instant method only)
    pub qr_payload: Option<String>,
    /// Reference the instant-payment network settles against
    pub settlement_reference: Option<String>,
    /// Administrator notes recorded on resolution
    pub admin_notes: Option<String>,
    /// Principal that resolved the transaction
    pub verified_by: Option<PrincipalId>,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Resolution instant
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Method-specific data captured when a transaction is created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MethodPayload {
    /// Nothing until an administrator confirms
    ManualCash,
    /// Output of the QR-generation collaborator
    InstantQr {
        /// Payload to encode in the QR image
        qr_payload: String,
        /// Reference the payment will be settled against
        settlement_reference: String,
    },
}

impl MethodPayload {
    /// The method this payload belongs to.
    #[must_use]
    pub const fn method(&self) -> PaymentMethod {
        match self {
            Self::ManualCash => PaymentMethod::ManualCash,
            Self::InstantQr { .. } => PaymentMethod::InstantQr,
        }
    }
}

/// Input for [`crate::providers::EntitlementStore::create`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSubscription {
    /// Entitled entity
    pub entity: EntityRef,
    /// Purchased tier
    pub tier: Tier,
    /// Price snapshot
    pub price: i64,
    /// Price currency
    pub currency: String,
    /// Purchase instant
    pub starts_at: DateTime<Utc>,
    /// Computed expiry
    pub expires_at: DateTime<Utc>,
}

/// Input for [`crate::providers::TransactionLedger::create`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTransaction {
    /// Owning subscription
    pub subscription_id: SubscriptionId,
    /// Amount due
    pub amount: i64,
    /// Currency
    pub currency: String,
    /// Method and its payload
    pub payload: MethodPayload,
    /// Creation instant
    pub created_at: DateTime<Utc>,
}

/// Terminal outcome of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Payment received
    Completed,
    /// Payment rejected
    Failed,
}

impl Outcome {
    /// Payment status this outcome resolves to.
    #[must_use]
    pub const fn payment_status(&self) -> PaymentStatus {
        match self {
            Self::Completed => PaymentStatus::Completed,
            Self::Failed => PaymentStatus::Failed,
        }
    }
}

/// Input for [`crate::providers::TransactionLedger::resolve`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Terminal outcome
    pub outcome: Outcome,
    /// Free-form administrator notes (the reason, for rejections)
    pub admin_notes: Option<String>,
    /// Resolving principal
    pub verified_by: PrincipalId,
    /// Resolution instant
    pub resolved_at: DateTime<Utc>,
}

/// Admin listing filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Only this method
    pub method: Option<PaymentMethod>,
    /// Only this status
    pub status: Option<PaymentStatus>,
    /// Page size
    pub limit: u32,
    /// Rows to skip
    pub offset: u32,
}

impl TransactionFilter {
    /// Default page size.
    pub const DEFAULT_LIMIT: u32 = 50;
    /// Largest accepted page size.
    pub const MAX_LIMIT: u32 = 200;

    /// Clamp the page size into `1..=MAX_LIMIT`.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.limit = self.limit.clamp(1, Self::MAX_LIMIT);
        self
    }
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            method: None,
            status: None,
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Admin listing row: a transaction joined with its subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionListing {
    /// The transaction
    #[serde(flatten)]
    pub transaction: PaymentTransaction,
    /// Tier of the owning subscription
    pub tier: Tier,
    /// Entity kind of the owning subscription
    pub entity_kind: EntityKind,
    /// Entity id of the owning subscription
    pub entity_id: EntityId,
    /// Stored status of the owning subscription
    pub subscription_status: SubscriptionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn active_subscription(expires_at: DateTime<Utc>) -> Subscription {
        let starts_at = expires_at - Duration::days(30);
        Subscription {
            id: SubscriptionId::new(),
            entity_kind: EntityKind::Profile,
            entity_id: EntityId::new(),
            tier: Tier::Short,
            status: SubscriptionStatus::Active,
            starts_at,
            expires_at,
            price_paid: 299,
            currency: "CZK".to_string(),
            transaction_id: None,
            updated_at: starts_at,
        }
    }

    #[test]
    fn test_enum_labels_parse_back() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().ok(), Some(kind));
        }
        for tier in Tier::ALL {
            assert_eq!(tier.as_str().parse::<Tier>().ok(), Some(tier));
        }
        assert_eq!(
            "pending_payment".parse::<SubscriptionStatus>().ok(),
            Some(SubscriptionStatus::PendingPayment)
        );
        assert_eq!("instant_qr".parse::<PaymentMethod>().ok(), Some(PaymentMethod::InstantQr));
    }

    #[test]
    fn test_unknown_labels_are_rejected() {
        assert!(matches!(
            "lifetime".parse::<Tier>(),
            Err(EntitlementError::InvalidInput { reason }) if reason == "unknown tier: lifetime"
        ));
        assert!(matches!(
            "company".parse::<EntityKind>(),
            Err(EntitlementError::InvalidInput { .. })
        ));
        assert!(matches!(
            "card".parse::<PaymentMethod>(),
            Err(EntitlementError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_effective_status_applies_expiry() {
        let expires_at = Utc::now();
        let sub = active_subscription(expires_at);

        assert_eq!(sub.effective_status(expires_at), SubscriptionStatus::Active);
        assert!(sub.is_vip(expires_at - Duration::seconds(1)));
        assert_eq!(
            sub.effective_status(expires_at + Duration::seconds(1)),
            SubscriptionStatus::Expired
        );
        assert!(!sub.is_vip(expires_at + Duration::seconds(1)));
    }

    #[test]
    fn test_expiry_only_affects_active() {
        let expires_at = Utc::now();
        let mut sub = active_subscription(expires_at);
        sub.status = SubscriptionStatus::Cancelled;

        assert_eq!(
            sub.effective_status(expires_at + Duration::days(1)),
            SubscriptionStatus::Cancelled
        );
    }

    #[test]
    fn test_live_statuses() {
        assert!(SubscriptionStatus::PendingPayment.is_live());
        assert!(SubscriptionStatus::Active.is_live());
        assert!(!SubscriptionStatus::Cancelled.is_live());
        assert!(!SubscriptionStatus::Failed.is_live());
        assert!(!SubscriptionStatus::Expired.is_live());
    }

    #[test]
    fn test_view_serializes_flat() {
        let sub = active_subscription(Utc::now());
        let view = SubscriptionView::at(sub, Utc::now() + Duration::days(1));
        let json = serde_json::to_value(&view).unwrap_or_default();

        assert_eq!(json["status"], "active");
        assert_eq!(json["effective_status"], "expired");
        assert_eq!(json["entity_kind"], "profile");
    }

    #[test]
    fn test_filter_clamps_limit() {
        let filter = TransactionFilter {
            limit: 10_000,
            ..TransactionFilter::default()
        }
        .clamped();
        assert_eq!(filter.limit, TransactionFilter::MAX_LIMIT);

        let filter = TransactionFilter {
            limit: 0,
            ..TransactionFilter::default()
        }
        .clamped();
        assert_eq!(filter.limit, 1);
    }
}
