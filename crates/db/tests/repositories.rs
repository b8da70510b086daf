//! Integration tests for the repository layer.
//!
//! Need a live Postgres reachable through `DATABASE_URL`; run with
//! `cargo test -p servicedesk-db -- --ignored`.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use servicedesk_core::appointment::Slot;
use servicedesk_core::busy_block::{BusyBlockDraft, BusySource};
use servicedesk_core::sus::RatingAggregate;
use servicedesk_core::ticket_lifecycle::{plan_accept, plan_close};
use servicedesk_core::ticket_status::TicketStatus;
use servicedesk_core::types::{DbId, Timestamp};
use servicedesk_core::urgency::Urgency;
use servicedesk_db::models::appointment::{CreateAppointment, RescheduleProposal};
use servicedesk_db::models::ticket::{CreateTicket, TicketFilter, TransitionNotes};
use servicedesk_db::repositories::{
    AppointmentRepo, BusyBlockRepo, TechnicianStatsRepo, TicketRepo,
};
use sqlx::PgPool;

const REQUESTER: DbId = 100;
const TECH: DbId = 200;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_ticket(title: &str, urgency: Urgency) -> CreateTicket {
    CreateTicket {
        title: title.to_string(),
        description: None,
        urgency,
    }
}

fn at(h: u32, m: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2026, 6, 15, h, m, 0).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
}

fn imported(title: &str, d: u32) -> BusyBlockDraft {
    let start = Utc.with_ymd_and_hms(2026, 6, d, 9, 0, 0).unwrap();
    BusyBlockDraft {
        user_id: TECH,
        title: title.to_string(),
        description: Some("Imported from Google Calendar".into()),
        date: day(d),
        start_time: Some(start),
        end_time: Some(start + Duration::hours(1)),
        color: "#3b82f6".into(),
        is_completed: false,
        source: BusySource::ExternalCalendar,
    }
}

fn manual(title: &str, d: u32) -> BusyBlockDraft {
    BusyBlockDraft {
        source: BusySource::Manual,
        description: None,
        start_time: None,
        end_time: None,
        ..imported(title, d)
    }
}

async fn book(
    pool: &PgPool,
    ticket_id: DbId,
    start: Timestamp,
) -> Result<servicedesk_db::models::appointment::Appointment, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let appt = AppointmentRepo::create(
        &mut tx,
        &CreateAppointment {
            ticket_id,
            it_support_id: TECH,
            slot: Slot::starting_at(start),
            note: None,
        },
    )
    .await?;
    tx.commit().await?;
    Ok(appt)
}

fn db_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn create_and_find_ticket(pool: PgPool) {
    let ticket = TicketRepo::create(&pool, REQUESTER, &new_ticket("  No VPN  ", Urgency::High))
        .await
        .unwrap();
    assert_eq!(ticket.title, "No VPN");
    assert_eq!(ticket.status(), TicketStatus::NotStart);
    assert_eq!(ticket.urgency(), Urgency::High);

    let found = TicketRepo::find_by_id(&pool, ticket.id).await.unwrap().unwrap();
    assert_eq!(found.id, ticket.id);
    assert!(TicketRepo::find_by_id(&pool, 999_999).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn status_filter_matches_legacy_spellings(pool: PgPool) {
    let a = TicketRepo::create(&pool, REQUESTER, &new_ticket("a", Urgency::Low))
        .await
        .unwrap();
    let b = TicketRepo::create(&pool, REQUESTER, &new_ticket("b", Urgency::Critical))
        .await
        .unwrap();
    TicketRepo::create(&pool, REQUESTER, &new_ticket("c", Urgency::Normal))
        .await
        .unwrap();
    sqlx::query("UPDATE tickets SET status = 'Done' WHERE id = $1")
        .bind(a.id)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE tickets SET status = 'Resolved' WHERE id = $1")
        .bind(b.id)
        .execute(&pool)
        .await
        .unwrap();

    let filter = TicketFilter {
        status: Some(TicketStatus::Completed),
        ..Default::default()
    };
    let completed = TicketRepo::list(&pool, &filter).await.unwrap();
    let ids: Vec<DbId> = completed.iter().map(|t| t.id).collect();
    // Most urgent first.
    assert_eq!(ids, vec![b.id, a.id]);
    assert!(completed.iter().all(|t| t.status() == TicketStatus::Completed));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn unknown_status_spelling_lists_as_not_start(pool: PgPool) {
    let odd = TicketRepo::create(&pool, REQUESTER, &new_ticket("odd", Urgency::Normal))
        .await
        .unwrap();
    let open = TicketRepo::create(&pool, REQUESTER, &new_ticket("open", Urgency::Low))
        .await
        .unwrap();
    let done = TicketRepo::create(&pool, REQUESTER, &new_ticket("done", Urgency::High))
        .await
        .unwrap();
    for (id, raw) in [(odd.id, "Awaiting Parts"), (open.id, "Open"), (done.id, "Done")] {
        sqlx::query("UPDATE tickets SET status = $1 WHERE id = $2")
            .bind(raw)
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();
    }

    let filter = TicketFilter {
        status: Some(TicketStatus::NotStart),
        ..Default::default()
    };
    let listed = TicketRepo::list(&pool, &filter).await.unwrap();
    let ids: Vec<DbId> = listed.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![odd.id, open.id]);
    assert!(listed.iter().all(|t| t.status() == TicketStatus::NotStart));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn stale_transition_matches_no_rows(pool: PgPool) {
    let ticket = TicketRepo::create(&pool, REQUESTER, &new_ticket("t", Urgency::Normal))
        .await
        .unwrap();
    let plan = plan_accept(&ticket.snapshot(), TECH, Utc::now()).unwrap();

    let mut tx = pool.begin().await.unwrap();
    let first = TicketRepo::apply_transition(
        &mut tx,
        ticket.id,
        &ticket.raw_status,
        &plan,
        &TransitionNotes::default(),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    let accepted = first.unwrap();
    assert_eq!(accepted.status(), TicketStatus::InProgress);
    assert_eq!(accepted.assigned_to_id, Some(TECH));
    assert!(accepted.accepted_at.is_some());

    // Replaying the same plan against the old snapshot must not apply.
    let mut tx = pool.begin().await.unwrap();
    let second = TicketRepo::apply_transition(
        &mut tx,
        ticket.id,
        &ticket.raw_status,
        &plan,
        &TransitionNotes::default(),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    assert!(second.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn acceptance_time_is_never_overwritten(pool: PgPool) {
    let ticket = TicketRepo::create(&pool, REQUESTER, &new_ticket("t", Urgency::Normal))
        .await
        .unwrap();
    let first_at = ticket.created_at + Duration::minutes(10);
    let plan = plan_accept(&ticket.snapshot(), TECH, first_at).unwrap();
    let mut tx = pool.begin().await.unwrap();
    let accepted = TicketRepo::apply_transition(
        &mut tx,
        ticket.id,
        &ticket.raw_status,
        &plan,
        &TransitionNotes::default(),
    )
    .await
    .unwrap()
    .unwrap();
    tx.commit().await.unwrap();

    // A forged plan carrying a later acceptance must not replace the first.
    let mut forged = plan_accept(&accepted.snapshot(), TECH, first_at).unwrap();
    forged.accepted_at = Some(first_at + Duration::hours(1));
    forged.response_time_minutes = Some(70);
    let mut tx = pool.begin().await.unwrap();
    let again = TicketRepo::apply_transition(
        &mut tx,
        accepted.id,
        &accepted.raw_status,
        &forged,
        &TransitionNotes::default(),
    )
    .await
    .unwrap()
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(again.accepted_at, accepted.accepted_at);
    assert_eq!(again.response_time_minutes, Some(10));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn close_writes_note_and_timing(pool: PgPool) {
    let ticket = TicketRepo::create(&pool, REQUESTER, &new_ticket("t", Urgency::Normal))
        .await
        .unwrap();
    let done_at = ticket.created_at + Duration::minutes(45);
    let plan = plan_close(&ticket.snapshot(), TECH, false, "Replaced cable", done_at).unwrap();
    let notes = TransitionNotes {
        resolution_note: Some("Replaced cable".into()),
        close_checklist: Some(serde_json::json!(["cable", "tested"])),
        ..Default::default()
    };

    let mut tx = pool.begin().await.unwrap();
    let closed = TicketRepo::apply_transition(&mut tx, ticket.id, &ticket.raw_status, &plan, &notes)
        .await
        .unwrap()
        .unwrap();
    TechnicianStatsRepo::increment_resolved(&mut tx, TECH).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(closed.status(), TicketStatus::Completed);
    assert_eq!(closed.resolution_time_minutes, Some(45));
    assert_eq!(closed.resolution_note.as_deref(), Some("Replaced cable"));
    let stats = TechnicianStatsRepo::find(&pool, TECH).await.unwrap().unwrap();
    assert_eq!(stats.resolved_count, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn rating_deltas_accumulate(pool: PgPool) {
    let mut tx = pool.begin().await.unwrap();
    let first = RatingAggregate::default().apply(None, 80);
    TechnicianStatsRepo::apply_rating_delta(&mut tx, TECH, first).await.unwrap();
    let rerate = RatingAggregate::default().apply(Some(80), 60);
    TechnicianStatsRepo::apply_rating_delta(&mut tx, TECH, rerate).await.unwrap();
    tx.commit().await.unwrap();

    let stats = TechnicianStatsRepo::find(&pool, TECH).await.unwrap().unwrap();
    assert_eq!(stats.rating_count, 1);
    assert_eq!(stats.average_rating(), Some(60.0));
}

// ---------------------------------------------------------------------------
// Appointments
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn second_live_appointment_for_ticket_is_rejected(pool: PgPool) {
    let ticket = TicketRepo::create(&pool, REQUESTER, &new_ticket("t", Urgency::Normal))
        .await
        .unwrap();
    book(&pool, ticket.id, at(9, 0)).await.unwrap();

    let err = book(&pool, ticket.id, at(14, 0)).await.unwrap_err();
    assert_eq!(db_code(&err).as_deref(), Some("23505"));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn overlapping_slots_violate_exclusion_constraint(pool: PgPool) {
    let t1 = TicketRepo::create(&pool, REQUESTER, &new_ticket("t1", Urgency::Normal))
        .await
        .unwrap();
    let t2 = TicketRepo::create(&pool, REQUESTER, &new_ticket("t2", Urgency::Normal))
        .await
        .unwrap();
    let t3 = TicketRepo::create(&pool, REQUESTER, &new_ticket("t3", Urgency::Normal))
        .await
        .unwrap();

    book(&pool, t1.id, at(10, 0)).await.unwrap();
    let err = book(&pool, t2.id, at(10, 30)).await.unwrap_err();
    assert_eq!(db_code(&err).as_deref(), Some("23P01"));

    // Back to back is fine.
    book(&pool, t3.id, at(11, 0)).await.unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn cancelled_appointment_frees_slot_and_ticket(pool: PgPool) {
    let t1 = TicketRepo::create(&pool, REQUESTER, &new_ticket("t1", Urgency::Normal))
        .await
        .unwrap();
    let t2 = TicketRepo::create(&pool, REQUESTER, &new_ticket("t2", Urgency::Normal))
        .await
        .unwrap();
    let appt = book(&pool, t1.id, at(10, 0)).await.unwrap();

    AppointmentRepo::cancel(&pool, appt.id).await.unwrap().unwrap();
    assert!(AppointmentRepo::cancel(&pool, appt.id).await.unwrap().is_none());
    assert!(AppointmentRepo::find_active_for_ticket(&pool, t1.id)
        .await
        .unwrap()
        .is_none());

    book(&pool, t2.id, at(10, 0)).await.unwrap();
    book(&pool, t1.id, at(13, 0)).await.unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn reschedule_commit_and_discard(pool: PgPool) {
    let ticket = TicketRepo::create(&pool, REQUESTER, &new_ticket("t", Urgency::Normal))
        .await
        .unwrap();
    let appt = book(&pool, ticket.id, at(10, 0)).await.unwrap();
    let proposal = RescheduleProposal {
        new_date: at(15, 0),
        reason: Some("Parts delayed".into()),
        initiator: "IT".into(),
    };

    // Reject keeps the original time.
    AppointmentRepo::request_reschedule(&pool, appt.id, &proposal)
        .await
        .unwrap()
        .unwrap();
    let kept = AppointmentRepo::discard_reschedule(&pool, appt.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kept.scheduled_at, at(10, 0));
    assert!(kept.new_date.is_none());
    assert!(kept.reschedule_reason.is_none());

    // Accept moves it.
    AppointmentRepo::request_reschedule(&pool, appt.id, &proposal)
        .await
        .unwrap()
        .unwrap();
    let moved = AppointmentRepo::commit_reschedule(&pool, appt.id, &Slot::starting_at(at(15, 0)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved.scheduled_at, at(15, 0));
    assert_eq!(moved.scheduled_end, at(16, 0));
    assert_eq!(moved.status, "scheduled");
    assert!(moved.new_date.is_none());
    assert!(moved.reschedule_initiator.is_none());

    // Nothing pending any more.
    assert!(AppointmentRepo::discard_reschedule(&pool, appt.id)
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Busy blocks
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn replace_imported_is_idempotent(pool: PgPool) {
    let drafts = vec![imported("Standup", 3), imported("Review", 4)];
    for _ in 0..2 {
        let inserted = BusyBlockRepo::replace_imported(&pool, TECH, day(1), &drafts)
            .await
            .unwrap();
        assert_eq!(inserted, 2);
    }
    let count = BusyBlockRepo::count_by_source(&pool, TECH, BusySource::ExternalCalendar)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn replace_imported_leaves_manual_and_older_blocks(pool: PgPool) {
    BusyBlockRepo::create(&pool, &manual("Dentist", 10)).await.unwrap();
    BusyBlockRepo::replace_imported(&pool, TECH, day(1), &[imported("Old import", 1)])
        .await
        .unwrap();

    // Window now starts on the 2nd: the import dated the 1st survives.
    BusyBlockRepo::replace_imported(&pool, TECH, day(2), &[])
        .await
        .unwrap();

    let all = BusyBlockRepo::list_for_user(&pool, TECH, day(1), day(30)).await.unwrap();
    let titles: Vec<&str> = all.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["Old import", "Dentist"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn failed_insert_keeps_previous_import(pool: PgPool) {
    BusyBlockRepo::replace_imported(&pool, TECH, day(1), &[imported("Keep me", 5)])
        .await
        .unwrap();

    // end_time before start_time violates a check constraint mid-insert.
    let mut broken = imported("Broken", 6);
    broken.end_time = broken.start_time.map(|s| s - Duration::hours(1));
    let result =
        BusyBlockRepo::replace_imported(&pool, TECH, day(1), &[imported("New", 5), broken]).await;
    assert!(result.is_err());

    let all = BusyBlockRepo::list_for_user(&pool, TECH, day(1), day(30)).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "Keep me");
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn candidates_include_all_day_and_overlapping_blocks(pool: PgPool) {
    BusyBlockRepo::create(&pool, &manual("Offsite", 15)).await.unwrap();
    let mut evening = imported("Evening", 14);
    evening.start_time = Some(Utc.with_ymd_and_hms(2026, 6, 14, 22, 0, 0).unwrap());
    evening.end_time = Some(Utc.with_ymd_and_hms(2026, 6, 15, 11, 0, 0).unwrap());
    BusyBlockRepo::create(&pool, &evening).await.unwrap();
    BusyBlockRepo::create(&pool, &imported("Elsewhere", 20)).await.unwrap();

    let slot = Slot::starting_at(at(10, 0));
    let blocks = BusyBlockRepo::list_candidates(&pool, TECH, &slot, &[day(15)])
        .await
        .unwrap();
    let mut titles: Vec<&str> = blocks.iter().map(|b| b.title.as_str()).collect();
    titles.sort_unstable();
    assert_eq!(titles, vec!["Evening", "Offsite"]);
}
