//! Shape checks run before any lock is taken.

use chrono::NaiveTime;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn required(value: &str, what: &'static str) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        return Err(EngineError::Validation(what));
    }
    Ok(())
}

pub(crate) fn max_len(value: &str, max: usize, what: &'static str) -> Result<(), EngineError> {
    if value.len() > max {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}

fn opt_text(value: &Option<String>, what: &'static str) -> Result<(), EngineError> {
    match value {
        Some(v) => max_len(v, MAX_TEXT_LEN, what),
        None => Ok(()),
    }
}

fn list(values: &[String], what: &'static str) -> Result<(), EngineError> {
    if values.len() > MAX_LIST_ITEMS || values.iter().any(|v| v.len() > MAX_NAME_LEN) {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}

pub(crate) fn code(value: &str) -> Result<(), EngineError> {
    required(value, "code is required")?;
    max_len(value, MAX_CODE_LEN, "code too long")
}

/// `start < end` or a validation error.
pub(crate) fn window(start: NaiveTime, end: NaiveTime) -> Result<Span, EngineError> {
    Span::try_new(start, end).ok_or(EngineError::Validation("start must be before end"))
}

pub(crate) fn email(value: &str) -> Result<(), EngineError> {
    required(value, "email is required")?;
    max_len(value, MAX_NAME_LEN, "email too long")?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(EngineError::Validation("email is malformed")),
    }
}

pub(crate) fn room_draft(draft: &RoomDraft) -> Result<(), EngineError> {
    code(&draft.code)?;
    required(&draft.name, "room name is required")?;
    required(&draft.location, "room location is required")?;
    required(&draft.room_type, "room type is required")?;
    if draft.capacity == 0 {
        return Err(EngineError::Validation("room capacity must be positive"));
    }
    max_len(&draft.name, MAX_NAME_LEN, "room name too long")?;
    max_len(&draft.location, MAX_NAME_LEN, "room location too long")?;
    max_len(&draft.room_type, MAX_NAME_LEN, "room type too long")?;
    list(&draft.equipment, "too much equipment")?;
    opt_text(&draft.description, "description too long")?;
    opt_text(&draft.contact, "contact too long")
}

/// Checks the merged record, so a patch is validated exactly like a draft.
pub(crate) fn room(room: &Room) -> Result<(), EngineError> {
    room_draft(&RoomDraft {
        code: room.code.clone(),
        name: room.name.clone(),
        location: room.location.clone(),
        capacity: room.capacity,
        room_type: room.room_type.clone(),
        equipment: room.equipment.clone(),
        hourly_rate: room.hourly_rate,
        description: room.description.clone(),
        contact: room.contact.clone(),
    })
}

pub(crate) fn speaker(speaker: &Speaker) -> Result<(), EngineError> {
    required(&speaker.external_ref, "speaker reference is required")?;
    max_len(&speaker.external_ref, MAX_CODE_LEN, "speaker reference too long")?;
    required(&speaker.first_name, "first name is required")?;
    required(&speaker.last_name, "last name is required")?;
    required(&speaker.specialty, "specialty is required")?;
    max_len(&speaker.first_name, MAX_NAME_LEN, "first name too long")?;
    max_len(&speaker.last_name, MAX_NAME_LEN, "last name too long")?;
    max_len(&speaker.specialty, MAX_NAME_LEN, "specialty too long")?;
    email(&speaker.email)?;
    list(&speaker.languages, "too many languages")?;
    opt_text(&speaker.biography, "biography too long")?;
    opt_text(&speaker.institution, "institution too long")?;
    opt_text(&speaker.position, "position too long")?;
    opt_text(&speaker.country, "country too long")?;
    opt_text(&speaker.phone, "phone too long")
}

pub(crate) fn details(details: &SessionDetails) -> Result<(), EngineError> {
    required(&details.title, "title is required")?;
    max_len(&details.title, MAX_NAME_LEN, "title too long")?;
    max_len(&details.language, MAX_NAME_LEN, "language too long")?;
    max_len(&details.level, MAX_NAME_LEN, "level too long")?;
    list(&details.tags, "too many tags")?;
    opt_text(&details.description, "description too long")?;
    opt_text(&details.category, "category too long")?;
    opt_text(&details.materials, "materials too long")?;
    opt_text(&details.organizer, "organizer too long")?;
    opt_text(&details.technical_requirements, "technical requirements too long")
}

pub(crate) fn attendee(attendee_id: &str, notes: &Option<String>) -> Result<(), EngineError> {
    required(attendee_id, "attendee is required")?;
    max_len(attendee_id, MAX_ATTENDEE_ID_LEN, "attendee id too long")?;
    opt_text(notes, "notes too long")
}

pub(crate) fn page(page: Page) -> Result<Page, EngineError> {
    if page.limit == 0 {
        return Err(EngineError::Validation("page limit must be positive"));
    }
    if page.limit > MAX_PAGE_SIZE {
        return Err(EngineError::LimitExceeded("page too large"));
    }
    Ok(page)
}
