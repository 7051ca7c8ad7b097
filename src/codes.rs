//! Drop-code generation, validity windows and verification.
//!
//! One 6-character secret per faucet gates the coded claim path. The window
//! arithmetic is pure so every case is unit-testable; database access is
//! confined to the `*_row` helpers at the bottom.

use chrono::Utc;
use rand::Rng;
use rand::rngs::OsRng;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;

use crate::entities::drop_code;
use crate::entities::prelude::DropCode;
use crate::error::RelayError;

pub const CODE_LENGTH: usize = 6;
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const SECONDS_PER_DAY: i64 = 86_400;
/// Fresh rotation window when no usable row exists
const FRESH_WINDOW_DAYS: i64 = 30;
/// Minimum runway granted to a not-yet-active window on rotation
const FUTURE_MIN_RUNWAY_DAYS: i64 = 7;

/// Draw a new code, each character independent and uniform over `[A-Z0-9]`.
pub fn generate_code() -> String {
    let mut rng = OsRng;
    (0..CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Outcome of checking a candidate code against the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Valid,
    Missing,
    Mismatch,
    Expired,
    Future,
}

impl CodeCheck {
    pub fn into_result(self) -> Result<(), RelayError> {
        match self {
            Self::Valid => Ok(()),
            Self::Missing => Err(RelayError::CodeMissing),
            Self::Mismatch => Err(RelayError::CodeInvalid),
            Self::Expired => Err(RelayError::CodeExpired),
            Self::Future => Err(RelayError::CodeFuture),
        }
    }
}

/// Pure verification: exact code match and `start <= now <= end` (both ends
/// inclusive). Window state is only reported for a matching code; a wrong
/// code is a mismatch regardless of the window.
pub fn evaluate(row: Option<(&str, i64, i64)>, candidate: &str, now: i64) -> CodeCheck {
    let Some((code, start, end)) = row else {
        return CodeCheck::Missing;
    };
    if code != candidate {
        return CodeCheck::Mismatch;
    }
    if now < start {
        return CodeCheck::Future;
    }
    if now > end {
        return CodeCheck::Expired;
    }
    CodeCheck::Valid
}

/// Window chosen when rotating a faucet's code, by cases over the existing
/// row: none or expired activates immediately for 30 days; a future window
/// keeps its start and is stretched to at least 7 days of runway; an active
/// window is preserved while only the code value swaps.
pub fn rotation_window(existing: Option<(i64, i64)>, now: i64) -> (i64, i64) {
    match existing {
        None => (now, now + FRESH_WINDOW_DAYS * SECONDS_PER_DAY),
        Some((_, end)) if now > end => (now, now + FRESH_WINDOW_DAYS * SECONDS_PER_DAY),
        Some((start, end)) if now < start => {
            (start, end.max(start + FUTURE_MIN_RUNWAY_DAYS * SECONDS_PER_DAY))
        }
        Some((start, end)) => (start, end),
    }
}

/// Derived metadata for code reads; never exposes the code value itself
/// unless the caller is authorized.
#[derive(Debug, Clone, Serialize)]
pub struct CodeMetadata {
    pub faucet_address: String,
    pub start_time: i64,
    pub end_time: i64,
    pub is_valid: bool,
    pub is_expired: bool,
    pub is_future: bool,
    pub time_remaining: i64,
}

impl CodeMetadata {
    pub fn from_row(row: &drop_code::Model, now: i64) -> Self {
        assert!(row.end_time > row.start_time, "Stored window must be ordered");
        Self {
            faucet_address: row.faucet_address.clone(),
            start_time: row.start_time,
            end_time: row.end_time,
            is_valid: now >= row.start_time && now <= row.end_time,
            is_expired: now > row.end_time,
            is_future: now < row.start_time,
            time_remaining: (row.end_time - now).max(0),
        }
    }
}

/// Fetch the row for a checksummed faucet address.
pub async fn find_row(
    db: &DatabaseConnection,
    faucet: &str,
) -> Result<Option<drop_code::Model>, RelayError> {
    let row = DropCode::find()
        .filter(drop_code::Column::FaucetAddress.eq(faucet))
        .one(db)
        .await?;
    Ok(row)
}

/// Replace any existing row for the faucet. `end > start` is enforced here so
/// no caller can persist an inverted window.
pub async fn upsert_row(
    db: &DatabaseConnection,
    faucet: &str,
    code: &str,
    start: i64,
    end: i64,
) -> Result<(), RelayError> {
    if end <= start {
        return Err(RelayError::Internal(format!(
            "drop-code window must end after it starts ({start}..{end})"
        )));
    }
    assert_eq!(code.len(), CODE_LENGTH, "Code length invariant broken");

    let model = drop_code::ActiveModel {
        faucet_address: Set(faucet.to_string()),
        code: Set(code.to_string()),
        start_time: Set(start),
        end_time: Set(end),
        created_at: Set(Utc::now().fixed_offset()),
    };
    DropCode::insert(model)
        .on_conflict(
            OnConflict::column(drop_code::Column::FaucetAddress)
                .update_columns([
                    drop_code::Column::Code,
                    drop_code::Column::StartTime,
                    drop_code::Column::EndTime,
                    drop_code::Column::CreatedAt,
                ])
                .to_owned(),
        )
        .exec(db)
        .await?;
    Ok(())
}

/// Swap the faucet's code for a fresh one, choosing the window by the
/// rotation cases. The previous code value stops verifying immediately.
pub async fn rotate(db: &DatabaseConnection, faucet: &str) -> Result<String, RelayError> {
    let now = Utc::now().timestamp();
    let existing = find_row(db, faucet)
        .await?
        .map(|row| (row.start_time, row.end_time));
    let (start, end) = rotation_window(existing, now);
    let code = generate_code();
    upsert_row(db, faucet, &code, start, end).await?;
    Ok(code)
}

/// Verify a candidate against the stored row at the current time.
pub async fn verify(
    db: &DatabaseConnection,
    faucet: &str,
    candidate: &str,
) -> Result<(), RelayError> {
    let now = Utc::now().timestamp();
    let row = find_row(db, faucet).await?;
    let snapshot = row
        .as_ref()
        .map(|r| (r.code.as_str(), r.start_time, r.end_time));
    evaluate(snapshot, candidate, now).into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_stay_in_alphabet() {
        for _ in 0..64 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(
                code.bytes().all(|b| CODE_ALPHABET.contains(&b)),
                "unexpected character in {code}"
            );
        }
    }

    #[test]
    fn window_boundaries_are_inclusive() {
        let row = Some(("A1B2C3", 100, 200));
        assert_eq!(evaluate(row, "A1B2C3", 100), CodeCheck::Valid);
        assert_eq!(evaluate(row, "A1B2C3", 200), CodeCheck::Valid);
        assert_eq!(evaluate(row, "A1B2C3", 201), CodeCheck::Expired);
        assert_eq!(evaluate(row, "A1B2C3", 99), CodeCheck::Future);
    }

    #[test]
    fn mismatch_beats_window_state() {
        let row = Some(("A1B2C3", 100, 200));
        assert_eq!(evaluate(row, "ZZZZZZ", 150), CodeCheck::Mismatch);
        // A wrong code inside an expired window still reports mismatch
        assert_eq!(evaluate(row, "ZZZZZZ", 500), CodeCheck::Mismatch);
        assert_eq!(evaluate(None, "A1B2C3", 150), CodeCheck::Missing);
    }

    #[test]
    fn rotation_without_row_opens_thirty_days() {
        let now = 1_750_000_000;
        let (start, end) = rotation_window(None, now);
        assert_eq!(start, now);
        assert_eq!(end, now + 30 * 86_400);
    }

    #[test]
    fn rotation_of_expired_row_activates_immediately() {
        let now = 1_750_000_000;
        let (start, end) = rotation_window(Some((1, now - 1)), now);
        assert_eq!(start, now);
        assert_eq!(end, now + 30 * 86_400);
    }

    #[test]
    fn rotation_of_future_row_keeps_start_and_stretches_end() {
        let now = 1_750_000_000;
        let start = now + 1_000;
        // Short runway gets stretched to seven days past start
        let (s, e) = rotation_window(Some((start, start + 60)), now);
        assert_eq!(s, start);
        assert_eq!(e, start + 7 * 86_400);
        // A longer window is left alone
        let far_end = start + 90 * 86_400;
        let (s, e) = rotation_window(Some((start, far_end)), now);
        assert_eq!(s, start);
        assert_eq!(e, far_end);
    }

    #[test]
    fn rotation_of_active_row_preserves_window() {
        let now = 1_750_000_000;
        let (s, e) = rotation_window(Some((now - 10, now + 10)), now);
        assert_eq!((s, e), (now - 10, now + 10));
    }

    #[test]
    fn metadata_flags_follow_the_window() {
        let row = drop_code::Model {
            faucet_address: "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".to_string(),
            code: "A1B2C3".to_string(),
            start_time: 100,
            end_time: 200,
            created_at: chrono::Utc::now().fixed_offset(),
        };

        let active = CodeMetadata::from_row(&row, 150);
        assert!(active.is_valid && !active.is_expired && !active.is_future);
        assert_eq!(active.time_remaining, 50);

        let expired = CodeMetadata::from_row(&row, 201);
        assert!(!expired.is_valid && expired.is_expired);
        assert_eq!(expired.time_remaining, 0);

        let future = CodeMetadata::from_row(&row, 99);
        assert!(!future.is_valid && future.is_future);
        assert_eq!(future.time_remaining, 101);
    }

    #[test]
    fn old_code_value_rejected_after_swap() {
        // Rotation replaces the stored value; verification against the new
        // row must report mismatch for the old code even in a live window.
        let rotated = Some(("NEW111", 100, 200));
        assert_eq!(evaluate(rotated, "OLD000", 150), CodeCheck::Mismatch);
    }
}
