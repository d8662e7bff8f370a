//! Roster helpers: self detection, host badge and avatar initials.
//!
//! The roster itself is whatever the server last sent; these helpers only
//! derive display facts from it and never mutate it.

use frames::Participant;

/// One roster row with its derived display facts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterEntry<'a> {
    pub participant: &'a Participant,
    /// This row is the local user.
    pub is_self: bool,
    /// First in server order, treated as the longest-present user.
    pub is_host: bool,
    /// Host badge is shown for the host unless the host is the local user.
    pub shows_host_badge: bool,
    pub initial: Option<char>,
}

/// True when `participant` is the local user.
#[must_use]
pub fn is_self(participant: &Participant, self_id: Option<&str>) -> bool {
    participant.is_current_user || self_id.is_some_and(|id| id == participant.id)
}

/// The longest-present participant, if anyone is here.
#[must_use]
pub fn host(roster: &[Participant]) -> Option<&Participant> {
    roster.first()
}

/// Uppercased first character of the display name.
#[must_use]
pub fn initial(participant: &Participant) -> Option<char> {
    participant.name.trim().chars().next().and_then(|c| c.to_uppercase().next())
}

/// Derive display rows in server order.
#[must_use]
pub fn entries<'a>(roster: &'a [Participant], self_id: Option<&str>) -> Vec<RosterEntry<'a>> {
    roster
        .iter()
        .enumerate()
        .map(|(index, participant)| {
            let is_self = is_self(participant, self_id);
            let is_host = index == 0;
            RosterEntry {
                participant,
                is_self,
                is_host,
                shows_host_badge: is_host && !is_self,
                initial: initial(participant),
            }
        })
        .collect()
}

/// Display name for `id`, if they are in the roster.
#[must_use]
pub fn name_of<'a>(roster: &'a [Participant], id: &str) -> Option<&'a str> {
    roster.iter().find(|p| p.id == id).map(|p| p.name.as_str())
}

#[cfg(test)]
#[path = "roster_test.rs"]
mod tests;
