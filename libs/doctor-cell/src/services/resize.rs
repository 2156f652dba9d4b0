// libs/doctor-cell/src/services/resize.rs
//
// Session window resizing. The planner works on a loaded snapshot of the
// session and produces one change set; nothing is written until the caller
// commits it.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_database::{ChangeSet, SessionSchedule};
use shared_models::scheduling::{Appointment, AppointmentStatus, Session, Slot};
use shared_models::time::{add_minutes, format_hhmm, minutes_between, to_minutes, window_contains_point};

use shared_utils::Clock;

use crate::models::DoctorError;
use crate::services::slots::SlotAllocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Start,
    End,
}

/// Everything a resize decided, ready to be committed.
#[derive(Debug, Clone)]
pub struct ResizePlan {
    pub session: Session,
    pub changes: ChangeSet,
    pub adjusted: Vec<Uuid>,
    pub pending: Vec<Uuid>,
    pub created_slots: Vec<Uuid>,
    pub deleted_slots: Vec<Uuid>,
    pub compressed: bool,
    pub message: String,
}

#[derive(Debug)]
struct WorkingSlot {
    slot: Slot,
    /// Confirmed and rescheduled appointments currently seated here.
    active: Vec<Appointment>,
    /// Appointments that reference the slot without holding a seat.
    history: Vec<Appointment>,
    marked: bool,
    created: bool,
}

impl WorkingSlot {
    fn fresh(slot: Slot) -> Self {
        Self {
            slot,
            active: Vec::new(),
            history: Vec::new(),
            marked: false,
            created: true,
        }
    }

    fn has_room(&self) -> bool {
        (self.active.len() as u64) < self.slot.max_bookings as u64
    }

    /// Reporting time the next seat would get, if it still lands inside the slot.
    fn next_reporting_time(&self, avg_consult_time: u32) -> Option<NaiveTime> {
        let offset = self.active.len() as i64 * avg_consult_time as i64;
        add_minutes(self.slot.start_time, offset)
            .ok()
            .filter(|t| *t < self.slot.end_time)
    }

    fn seat(&mut self, mut appointment: Appointment, reporting_time: NaiveTime) {
        appointment.slot_id = Some(self.slot.id);
        appointment.reporting_time = Some(reporting_time);
        self.active.push(appointment);
    }
}

struct Workspace {
    session: Session,
    slots: Vec<WorkingSlot>,
    pending: Vec<Appointment>,
    original_slots: HashMap<Uuid, Slot>,
    original_appointments: HashMap<Uuid, Appointment>,
    compressed: bool,
    notes: Vec<String>,
}

impl Workspace {
    fn load(schedule: &SessionSchedule) -> Self {
        let mut slots = Vec::with_capacity(schedule.slots.len());
        let mut original_slots = HashMap::new();
        let mut original_appointments = HashMap::new();

        for entry in &schedule.slots {
            original_slots.insert(entry.slot.id, entry.slot.clone());
            let (active, history): (Vec<_>, Vec<_>) = entry
                .appointments
                .iter()
                .cloned()
                .partition(Appointment::is_active);
            for appointment in &entry.appointments {
                original_appointments.insert(appointment.id, appointment.clone());
            }
            slots.push(WorkingSlot {
                slot: entry.slot.clone(),
                active,
                history,
                marked: false,
                created: false,
            });
        }
        slots.sort_by_key(|s| s.slot.start_time);

        Self {
            session: schedule.session.clone(),
            slots,
            pending: Vec::new(),
            original_slots,
            original_appointments,
            compressed: false,
            notes: Vec::new(),
        }
    }

    /// Tile `[from, to)` with fresh slots and move `edge` of the window to
    /// the far end of that range.
    fn expand(&mut self, edge: Edge, from: NaiveTime, to: NaiveTime) {
        let boundary = match edge {
            Edge::Start => from,
            Edge::End => to,
        };

        let tiling = SlotAllocator::generate_slots(
            &self.session,
            from,
            to,
            self.session.slot_duration,
            self.session.avg_consult_time,
        );
        let before = self.slots.len();
        self.slots.extend(tiling.map(WorkingSlot::fresh));
        let added = self.slots.len() - before;
        self.slots.sort_by_key(|s| s.slot.start_time);

        match edge {
            Edge::Start => self.session.consult_start = boundary,
            Edge::End => self.session.consult_end = boundary,
        }

        debug!("Expanded session {} by {}-{} with {} slots",
               self.session.id, format_hhmm(from), format_hhmm(to), added);
        self.notes.push(format!(
            "Added {} slots for {}-{}.",
            added,
            format_hhmm(from),
            format_hhmm(to)
        ));
    }

    /// Mark slots that fall outside the new boundary, trim the one straddling
    /// it and hand back the appointments that no longer fit where they are.
    fn release(&mut self, edge: Edge, boundary: NaiveTime) -> Vec<Appointment> {
        let avg = self.session.avg_consult_time;
        let mut affected = Vec::new();

        for working in self.slots.iter_mut().filter(|s| !s.marked) {
            let (start, end) = working.slot.window();
            let outside = match edge {
                Edge::End => start >= boundary,
                Edge::Start => end <= boundary,
            };
            if outside {
                working.marked = true;
                affected.append(&mut working.active);
                continue;
            }

            if !(start < boundary && boundary < end) {
                continue;
            }

            let (keep, moved): (Vec<_>, Vec<_>) = std::mem::take(&mut working.active)
                .into_iter()
                .partition(|a| {
                    let reporting = a.reporting_time.unwrap_or(start);
                    match edge {
                        Edge::End => reporting < boundary,
                        Edge::Start => reporting >= boundary,
                    }
                });
            working.active = keep;
            affected.extend(moved);

            match edge {
                Edge::End => working.slot.end_time = boundary,
                Edge::Start => working.slot.start_time = boundary,
            }
            let derived = SlotAllocator::derive_capacity(working.slot.start_time, working.slot.end_time, avg);
            working.slot.max_bookings = derived.max(working.active.len() as u32);
        }

        match edge {
            Edge::Start => self.session.consult_start = boundary,
            Edge::End => self.session.consult_end = boundary,
        }

        affected
    }

    /// Surviving slots, ascending by start, that lie in the window and have
    /// not started yet.
    fn valid_slots(&self, now: NaiveDateTime) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.marked)
            .filter(|(_, s)| window_contains_point(self.session.window(), s.slot.start_time))
            .filter(|(_, s)| self.session.at(s.slot.start_time) >= now)
            .map(|(i, _)| i)
            .collect()
    }

    /// Every seat of the surviving slots is taken, counting appointments
    /// already waiting for one.
    fn fully_booked(&self) -> bool {
        let (capacity, seated) = self
            .slots
            .iter()
            .filter(|s| !s.marked)
            .fold((0u64, 0u64), |(capacity, seated), s| {
                (capacity + s.slot.max_bookings as u64, seated + s.active.len() as u64)
            });
        capacity > 0 && seated + self.pending.len() as u64 >= capacity
    }

    fn drain_active(&mut self) -> Vec<Appointment> {
        self.slots
            .iter_mut()
            .filter(|s| !s.marked)
            .flat_map(|s| std::mem::take(&mut s.active))
            .collect()
    }

    fn finish(self, stamp: DateTime<Utc>) -> ResizePlan {
        let Workspace {
            session,
            slots,
            pending,
            original_slots,
            original_appointments,
            compressed,
            mut notes,
        } = self;

        let mut changes = ChangeSet::new();
        let mut adjusted = Vec::new();
        let mut pending_ids = Vec::new();
        let mut created_slots = Vec::new();
        let mut deleted_slots = Vec::new();

        let mut unplaced = pending;

        for working in slots {
            let WorkingSlot { mut slot, active, history, marked, created } = working;

            if marked {
                unplaced.extend(active);
                for mut appointment in history {
                    appointment.slot_id = None;
                    appointment.updated_at = stamp;
                    changes.appointments.push(appointment);
                }
                if !created {
                    deleted_slots.push(slot.id);
                }
                continue;
            }

            slot.sync_booked(active.len());
            if created {
                created_slots.push(slot.id);
                changes.slots.push(slot.clone());
            } else if original_slots.get(&slot.id) != Some(&slot) {
                changes.slots.push(slot.clone());
            }

            for mut appointment in active {
                let Some(original) = original_appointments.get(&appointment.id) else {
                    continue;
                };
                if original.slot_id != appointment.slot_id {
                    appointment.status = AppointmentStatus::Rescheduled;
                }
                if *original != appointment {
                    appointment.updated_at = stamp;
                    adjusted.push(appointment.id);
                    changes.appointments.push(appointment);
                }
            }
        }

        for mut appointment in unplaced {
            appointment.status = AppointmentStatus::PendingReschedule;
            appointment.slot_id = None;
            appointment.reporting_time = None;
            appointment.updated_at = stamp;
            pending_ids.push(appointment.id);
            changes.appointments.push(appointment);
        }

        changes.sessions.push(session.clone());
        changes.deleted_slots = deleted_slots.clone();

        if !adjusted.is_empty() || !pending_ids.is_empty() {
            notes.push(format!(
                "Adjusted {} appointments, {} require manual reschedule.",
                adjusted.len(),
                pending_ids.len()
            ));
        }
        if compressed {
            notes.push(format!(
                "Consult time compressed to {} minutes.",
                session.avg_consult_time
            ));
        }
        if notes.is_empty() {
            notes.push("Session updated successfully.".to_string());
        }

        ResizePlan {
            session,
            changes,
            adjusted,
            pending: pending_ids,
            created_slots,
            deleted_slots,
            compressed,
            message: notes.join(" "),
        }
    }
}

/// Plans a change of a session's consult window.
pub struct ResizePlanner<'a> {
    config: &'a SchedulingConfig,
    now: NaiveDateTime,
    stamp: DateTime<Utc>,
}

impl<'a> ResizePlanner<'a> {
    pub fn new(config: &'a SchedulingConfig, clock: &dyn Clock) -> Self {
        Self {
            config,
            now: clock.now(),
            stamp: clock.utc_now(),
        }
    }

    pub fn plan(
        &self,
        schedule: &SessionSchedule,
        new_start: NaiveTime,
        new_end: NaiveTime,
    ) -> Result<ResizePlan, DoctorError> {
        if new_start >= new_end {
            return Err(DoctorError::InvalidWindow(
                "Start time must be before end time".to_string(),
            ));
        }

        let original = &schedule.session;
        debug!("Planning resize of session {} from {}-{} to {}-{}",
               original.id,
               format_hhmm(original.consult_start), format_hhmm(original.consult_end),
               format_hhmm(new_start), format_hhmm(new_end));

        let booking_open = self.booking_open(original);
        let mut workspace = Workspace::load(schedule);

        // Added capacity goes in first so displaced appointments can use it.
        // Neither range reaches past the opposite new boundary.
        if new_start < original.consult_start {
            workspace.expand(Edge::Start, new_start, original.consult_start.min(new_end));
        }
        if new_end > original.consult_end {
            workspace.expand(Edge::End, original.consult_end.max(new_start), new_end);
        }

        if new_start > original.consult_start {
            self.shrink(&mut workspace, Edge::Start, new_start, booking_open)?;
        }
        if new_end < original.consult_end {
            self.shrink(&mut workspace, Edge::End, new_end, booking_open)?;
        }

        let plan = workspace.finish(self.stamp);
        if !plan.pending.is_empty() {
            warn!("Resize of session {} leaves {} appointments pending reschedule",
                  plan.session.id, plan.pending.len());
        }
        info!("Planned resize of session {}: {} adjusted, {} pending, {} slots created, {} deleted",
              plan.session.id, plan.adjusted.len(), plan.pending.len(),
              plan.created_slots.len(), plan.deleted_slots.len());

        Ok(plan)
    }

    /// Patients can still book: booking has opened and consultation is more
    /// than the cutoff away.
    fn booking_open(&self, session: &Session) -> bool {
        let opens = session.at(session.booking_start);
        let cutoff = session.at(session.consult_start)
            - Duration::minutes(self.config.open_booking_cutoff_minutes as i64);
        opens <= self.now && self.now <= cutoff
    }

    fn shrink(
        &self,
        workspace: &mut Workspace,
        edge: Edge,
        boundary: NaiveTime,
        booking_open: bool,
    ) -> Result<(), DoctorError> {
        let fully_booked = workspace.fully_booked();
        let mut affected = workspace.release(edge, boundary);
        if affected.is_empty() {
            debug!("Shrinking {:?} of session {} to {} affects no appointments",
                   edge, workspace.session.id, format_hhmm(boundary));
            return Ok(());
        }
        affected.sort_by_key(Appointment::queue_key);

        debug!("Shrinking {:?} of session {} to {} affects {} appointments (booking open: {}, fully booked: {})",
               edge, workspace.session.id, format_hhmm(boundary), affected.len(), booking_open, fully_booked);

        if !booking_open {
            self.reassign_greedy(workspace, affected);
            return Ok(());
        }

        if fully_booked {
            let mut queue = workspace.drain_active();
            queue.extend(affected);
            queue.sort_by_key(Appointment::queue_key);
            return self.compress(workspace, queue);
        }

        let leftovers = self.reassign_partial(workspace, edge, affected);
        if leftovers.is_empty() {
            return Ok(());
        }

        debug!("{} appointments did not fit, compressing session {}",
               leftovers.len(), workspace.session.id);
        let mut everyone = workspace.drain_active();
        everyone.extend(leftovers);
        everyone.extend(std::mem::take(&mut workspace.pending));
        everyone.sort_by_key(Appointment::creation_key);
        self.compress(workspace, everyone)
    }

    /// Each appointment takes the earliest slot that starts more than the lead
    /// buffer after now and still has a seat inside its window.
    fn reassign_greedy(&self, workspace: &mut Workspace, affected: Vec<Appointment>) {
        let lead = Duration::minutes(self.config.reassignment_lead_minutes as i64);
        let avg = workspace.session.avg_consult_time;
        let candidates = workspace.valid_slots(self.now);

        for appointment in affected {
            let target = candidates.iter().copied().find_map(|i| {
                let working = &workspace.slots[i];
                if workspace.session.at(working.slot.start_time) - self.now <= lead || !working.has_room() {
                    return None;
                }
                working.next_reporting_time(avg).map(|t| (i, t))
            });

            match target {
                Some((i, reporting_time)) => workspace.slots[i].seat(appointment, reporting_time),
                None => workspace.pending.push(appointment),
            }
        }
    }

    /// Cursor walk towards the kept side of the window: latest-first when the
    /// end moved, earliest-first when the start moved. Returns what did not fit.
    fn reassign_partial(
        &self,
        workspace: &mut Workspace,
        edge: Edge,
        mut affected: Vec<Appointment>,
    ) -> Vec<Appointment> {
        let avg = workspace.session.avg_consult_time;
        let mut candidates = workspace.valid_slots(self.now);
        if edge == Edge::End {
            candidates.reverse();
            affected.reverse();
        }

        let mut cursor = 0;
        let mut leftovers = Vec::new();

        for appointment in affected {
            let mut target = None;
            while let Some(&i) = candidates.get(cursor) {
                let working = &workspace.slots[i];
                if working.has_room() {
                    if let Some(t) = working.next_reporting_time(avg) {
                        target = Some((i, t));
                        break;
                    }
                }
                cursor += 1;
            }

            match target {
                Some((i, reporting_time)) => workspace.slots[i].seat(appointment, reporting_time),
                None => leftovers.push(appointment),
            }
        }

        leftovers
    }

    /// Re-space `queue` evenly over the whole consult window. Appointments
    /// beyond what fits at the minimum cadence go pending.
    fn compress(&self, workspace: &mut Workspace, queue: Vec<Appointment>) -> Result<(), DoctorError> {
        if queue.is_empty() {
            return Ok(());
        }

        let (start, end) = workspace.session.window();
        let total = minutes_between(start, end).max(0) as u32;
        let min = self.config.min_consult_minutes.max(1);
        let fit = (total / min) as usize;
        let cadence = if queue.len() <= fit {
            (total / queue.len() as u32).max(min)
        } else {
            min
        };

        for (i, appointment) in queue.into_iter().enumerate() {
            if i >= fit {
                workspace.pending.push(appointment);
                continue;
            }

            let reporting_time = add_minutes(start, i as i64 * cadence as i64)?;
            let owner = workspace
                .slots
                .iter()
                .position(|s| !s.marked && window_contains_point(s.slot.window(), reporting_time))
                .ok_or_else(|| {
                    warn!("No slot of session {} covers reporting time {}",
                          workspace.session.id, format_hhmm(reporting_time));
                    DoctorError::ResizeInvariant(format!(
                        "no slot covers reporting time {}",
                        format_hhmm(reporting_time)
                    ))
                })?;
            workspace.slots[owner].seat(appointment, reporting_time);
        }

        let origin = to_minutes(start);
        for working in workspace.slots.iter_mut().filter(|s| !s.marked) {
            let from = to_minutes(working.slot.start_time).saturating_sub(origin);
            let to = to_minutes(working.slot.end_time).saturating_sub(origin);
            let ticks = to.div_ceil(cadence) - from.div_ceil(cadence);
            working.slot.max_bookings = ticks.max(1).max(working.active.len() as u32);
        }

        workspace.session.avg_consult_time = cadence;
        workspace.compressed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_database::SlotBookings;
    use shared_utils::test_utils::{at, date, hm, FixedClock};

    fn clock_at(hour: u32, minute: u32) -> FixedClock {
        FixedClock::new(at(date(2025, 6, 20), hour, minute))
    }

    fn session(start: NaiveTime, end: NaiveTime) -> Session {
        Session {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            session_date: date(2025, 6, 20),
            consult_start: start,
            consult_end: end,
            booking_start: hm(6, 0),
            avg_consult_time: 10,
            slot_duration: 30,
            is_active: true,
            recurring_template_id: None,
            created_at: Utc::now(),
        }
    }

    fn schedule(session: &Session) -> SessionSchedule {
        let slots = SlotAllocator::generate_slots(
            session,
            session.consult_start,
            session.consult_end,
            session.slot_duration,
            session.avg_consult_time,
        )
        .map(|slot| SlotBookings { slot, appointments: Vec::new() })
        .collect();
        SessionSchedule { session: session.clone(), slots }
    }

    #[test]
    fn expansion_only_adds_slots() {
        let session = session(hm(9, 0), hm(11, 0));
        let config = SchedulingConfig::default();
        let planner = ResizePlanner::new(&config, &clock_at(7, 0));

        let plan = planner.plan(&schedule(&session), hm(8, 0), hm(12, 0)).unwrap();

        assert_eq!(plan.created_slots.len(), 4);
        assert!(plan.deleted_slots.is_empty());
        assert!(plan.adjusted.is_empty());
        assert_eq!(plan.session.window(), (hm(8, 0), hm(12, 0)));
    }

    #[test]
    fn rejects_inverted_window() {
        let session = session(hm(9, 0), hm(11, 0));
        let config = SchedulingConfig::default();
        let planner = ResizePlanner::new(&config, &clock_at(7, 0));

        let err = planner.plan(&schedule(&session), hm(10, 0), hm(10, 0)).unwrap_err();
        assert!(matches!(err, DoctorError::InvalidWindow(_)));
    }

    #[test]
    fn booking_open_window_uses_cutoff() {
        let session = session(hm(9, 0), hm(11, 0));
        let config = SchedulingConfig::default();

        assert!(ResizePlanner::new(&config, &clock_at(7, 0)).booking_open(&session));
        assert!(!ResizePlanner::new(&config, &clock_at(7, 1)).booking_open(&session));
        assert!(!ResizePlanner::new(&config, &clock_at(5, 59)).booking_open(&session));
    }

    #[test]
    fn shrinking_an_empty_session_deletes_trailing_slots() {
        let session = session(hm(9, 0), hm(11, 0));
        let config = SchedulingConfig::default();
        let planner = ResizePlanner::new(&config, &clock_at(7, 0));

        let plan = planner.plan(&schedule(&session), hm(9, 0), hm(10, 15)).unwrap();

        assert_eq!(plan.deleted_slots.len(), 1);
        let trimmed = plan
            .changes
            .slots
            .iter()
            .find(|s| s.start_time == hm(10, 0))
            .unwrap();
        assert_eq!(trimmed.end_time, hm(10, 15));
        assert_eq!(trimmed.max_bookings, 1);
    }
}
