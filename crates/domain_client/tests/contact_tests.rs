//! Billing Contact Tests
//!
//! Exercises relationship creation, payer resolution and billing
//! assignment through `ClientService`, including the couples mirror:
//! whatever sequence of assignments two partners make, their couples
//! sessions always resolve to exactly one payer.

use proptest::prelude::*;

use core_kernel::ClientId;
use domain_client::{
    BillingContact, BillingEntity, BillingProfileUpdate, BillingType, Client, ClientError, ClientRelationship,
    Counterparty, RelationshipKind, SessionCategory,
};
use test_utils::{ClientFixtures, TestPractice};

// ============================================================================
// TEST FIXTURES
// ============================================================================

/// Two clients with their own corporate relationships, not yet partners
struct Pair {
    practice: TestPractice,
    a: Client,
    b: Client,
    entity: BillingEntity,
    corporate_a: ClientRelationship,
    corporate_b: ClientRelationship,
}

struct Couple {
    practice: TestPractice,
    a: Client,
    b: Client,
    partner: ClientRelationship,
    corporate_a: ClientRelationship,
    corporate_b: ClientRelationship,
}

async fn pair() -> Pair {
    let practice = TestPractice::new();
    let a = practice.register(ClientFixtures::postpaid()).await;
    let b = practice.register(ClientFixtures::postpaid()).await;
    let entity = practice.register_entity(ClientFixtures::corporate()).await;

    let corporate_a = practice
        .clients
        .relate(a.id, Counterparty::Entity(entity.id), RelationshipKind::Corporate, Some("Employer".into()))
        .await
        .unwrap();
    let corporate_b = practice
        .clients
        .relate(b.id, Counterparty::Entity(entity.id), RelationshipKind::Corporate, None)
        .await
        .unwrap();

    Pair {
        practice,
        a,
        b,
        entity,
        corporate_a,
        corporate_b,
    }
}

async fn couple() -> Couple {
    let p = pair().await;
    let partner = p.practice.partners(p.a.id, p.b.id).await;
    Couple {
        practice: p.practice,
        a: p.a,
        b: p.b,
        partner,
        corporate_a: p.corporate_a,
        corporate_b: p.corporate_b,
    }
}

async fn payers_of(practice: &TestPractice, a: ClientId, b: ClientId) -> (Counterparty, Counterparty) {
    let a = practice.clients.resolve(a, SessionCategory::Couples).await.unwrap();
    let b = practice.clients.resolve(b, SessionCategory::Couples).await.unwrap();
    (a.payer(), b.payer())
}

async fn couples_payers(c: &Couple) -> (Counterparty, Counterparty) {
    payers_of(&c.practice, c.a.id, c.b.id).await
}

// ============================================================================
// REGISTRATION AND RELATIONSHIPS
// ============================================================================

#[tokio::test]
async fn test_register_rejects_invalid_email() {
    let practice = TestPractice::new();
    let err = practice
        .clients
        .register_client(Client::new("Thandi Nkosi", "not-an-email"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}

#[tokio::test]
async fn test_update_billing_profile() {
    let practice = TestPractice::new();
    let client = practice.register(ClientFixtures::prepaid()).await;

    let updated = practice
        .clients
        .update_billing_profile(
            client.id,
            BillingProfileUpdate {
                billing_type: Some(BillingType::Postpaid),
                billing_email: Some(Some("accounts@example.com".into())),
                standing_discount: None,
            },
        )
        .await
        .unwrap();

    assert!(updated.is_postpaid());
    assert_eq!(updated.invoice_email(), "accounts@example.com");
}

#[tokio::test]
async fn test_second_partner_is_rejected() {
    let practice = TestPractice::new();
    let a = practice.register(ClientFixtures::prepaid()).await;
    let b = practice.register(ClientFixtures::prepaid()).await;
    let c = practice.register(ClientFixtures::prepaid()).await;
    practice.partners(a.id, b.id).await;

    let err = practice
        .clients
        .relate(c.id, Counterparty::Client(b.id), RelationshipKind::Partner, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}

#[tokio::test]
async fn test_relate_to_unknown_entity() {
    let practice = TestPractice::new();
    let a = practice.register(ClientFixtures::prepaid()).await;
    let err = practice
        .clients
        .relate(
            a.id,
            Counterparty::Entity(core_kernel::BillingEntityId::new()),
            RelationshipKind::Corporate,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotFound { entity: "BillingEntity", .. }));
}

// ============================================================================
// RESOLUTION
// ============================================================================

#[tokio::test]
async fn test_unassigned_client_self_pays() {
    let c = couple().await;
    let contact = c.practice.clients.resolve(c.a.id, SessionCategory::Individual).await.unwrap();
    assert_eq!(contact, BillingContact::SelfPay { client_id: c.a.id });
}

#[tokio::test]
async fn test_individual_assignment_to_corporate() {
    let c = couple().await;
    c.practice
        .assign(c.a.id, SessionCategory::Individual, Some(c.corporate_a.id))
        .await;

    let contact = c.practice.clients.resolve(c.a.id, SessionCategory::Individual).await.unwrap();
    assert_eq!(contact.relationship_id(), Some(c.corporate_a.id));
    assert!(contact.billing_entity_id().is_some());

    // couples sessions are unaffected
    let couples = c.practice.clients.resolve(c.a.id, SessionCategory::Couples).await.unwrap();
    assert!(couples.is_self_pay());
}

#[tokio::test]
async fn test_assignment_to_foreign_relationship_is_invalid() {
    let c = couple().await;
    let err = c
        .practice
        .clients
        .assign_billing(c.a.id, SessionCategory::Individual, Some(c.corporate_b.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidRelationship { .. }));

    let contact = c.practice.clients.resolve(c.a.id, SessionCategory::Individual).await.unwrap();
    assert!(contact.is_self_pay());
}

// ============================================================================
// COUPLES MIRROR
// ============================================================================

#[tokio::test]
async fn test_partner_creator_pays_by_default() {
    let c = couple().await;
    let (a, b) = couples_payers(&c).await;
    assert_eq!(a, Counterparty::Client(c.a.id));
    assert_eq!(b, Counterparty::Client(c.a.id));
}

#[tokio::test]
async fn test_choosing_partner_as_payer_flips_both_sides() {
    let c = couple().await;
    c.practice
        .assign(c.a.id, SessionCategory::Couples, Some(c.partner.id))
        .await;

    let (a, b) = couples_payers(&c).await;
    assert_eq!(a, Counterparty::Client(c.b.id));
    assert_eq!(b, Counterparty::Client(c.b.id));
}

#[tokio::test]
async fn test_self_pay_clears_partner_corporate_assignment() {
    let c = couple().await;
    c.practice
        .assign(c.b.id, SessionCategory::Couples, Some(c.corporate_b.id))
        .await;
    let b_contact = c.practice.clients.resolve(c.b.id, SessionCategory::Couples).await.unwrap();
    assert!(b_contact.billing_entity_id().is_some());

    c.practice.assign(c.a.id, SessionCategory::Couples, None).await;

    let b_client = c.practice.clients.get_client(c.b.id).await.unwrap();
    assert_eq!(b_client.couples_billed_to, None);
    let (a, b) = couples_payers(&c).await;
    assert_eq!(a, Counterparty::Client(c.a.id));
    assert_eq!(b, Counterparty::Client(c.a.id));
}

#[tokio::test]
async fn test_paying_partner_routes_both_to_their_entity() {
    let c = couple().await;
    c.practice
        .assign(c.a.id, SessionCategory::Couples, Some(c.corporate_a.id))
        .await;

    let b_contact = c.practice.clients.resolve(c.b.id, SessionCategory::Couples).await.unwrap();
    assert_eq!(b_contact.relationship_id(), Some(c.partner.id));
    assert!(b_contact.billing_entity_id().is_some());

    let (a, b) = couples_payers(&c).await;
    assert_eq!(a, b);
}

// ============================================================================
// PARTNERSHIP AFTER ASSIGNMENT
// ============================================================================

#[tokio::test]
async fn test_partnership_keeps_the_existing_corporate_payer() {
    let p = pair().await;
    p.practice
        .assign(p.b.id, SessionCategory::Couples, Some(p.corporate_b.id))
        .await;

    let partner = p.practice.partners(p.a.id, p.b.id).await;

    assert_eq!(partner.couples_payer, Some(p.b.id));
    let (a, b) = payers_of(&p.practice, p.a.id, p.b.id).await;
    assert_eq!(a, Counterparty::Entity(p.entity.id));
    assert_eq!(b, Counterparty::Entity(p.entity.id));
}

#[tokio::test]
async fn test_partnership_between_two_assigned_clients_keeps_the_creator() {
    let p = pair().await;
    p.practice
        .assign(p.a.id, SessionCategory::Couples, Some(p.corporate_a.id))
        .await;
    p.practice
        .assign(p.b.id, SessionCategory::Couples, Some(p.corporate_b.id))
        .await;

    let partner = p.practice.partners(p.a.id, p.b.id).await;

    assert_eq!(partner.couples_payer, Some(p.a.id));
    let b_client = p.practice.clients.get_client(p.b.id).await.unwrap();
    assert_eq!(b_client.couples_billed_to, None);
    let a_client = p.practice.clients.get_client(p.a.id).await.unwrap();
    assert_eq!(a_client.couples_billed_to, Some(p.corporate_a.id));

    let (a, b) = payers_of(&p.practice, p.a.id, p.b.id).await;
    assert_eq!(a, b);
}

#[derive(Debug, Clone, Copy)]
enum Side {
    A,
    B,
}

#[derive(Debug, Clone, Copy)]
enum Choice {
    SelfPay,
    Partner,
    Corporate,
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::A), Just(Side::B)]
}

fn step_strategy() -> impl Strategy<Value = (Side, Choice)> {
    (
        side_strategy(),
        prop_oneof![Just(Choice::SelfPay), Just(Choice::Partner), Just(Choice::Corporate)],
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Assignments happen before and after the partnership is created, by
    /// either partner; once partnered, both always resolve to the same payer.
    #[test]
    fn couples_always_resolve_to_one_payer(
        steps in proptest::collection::vec(step_strategy(), 0..12),
        relate_at in 0usize..12,
        creator in side_strategy(),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let p = pair().await;
            let relate_at = relate_at.min(steps.len());
            let mut partner: Option<ClientRelationship> = None;

            for (index, step) in steps.iter().map(Some).chain(std::iter::once(None)).enumerate() {
                if index == relate_at {
                    let (from, to) = match creator {
                        Side::A => (p.a.id, p.b.id),
                        Side::B => (p.b.id, p.a.id),
                    };
                    partner = Some(p.practice.partners(from, to).await);
                }

                if let Some(&(side, choice)) = step {
                    let (client, corporate) = match side {
                        Side::A => (p.a.id, p.corporate_a.id),
                        Side::B => (p.b.id, p.corporate_b.id),
                    };
                    let target = match choice {
                        Choice::SelfPay => None,
                        Choice::Partner => partner.as_ref().map(|r| r.id),
                        Choice::Corporate => Some(corporate),
                    };
                    p.practice.assign(client, SessionCategory::Couples, target).await;
                }

                if partner.is_some() {
                    let (a, b) = payers_of(&p.practice, p.a.id, p.b.id).await;
                    assert_eq!(a, b, "partners resolve to different couples payers");
                }
            }
            assert!(partner.is_some());
        });
    }
}
