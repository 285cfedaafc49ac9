//! Deterministic unique-name resolution.
//!
//! Given a desired prefix and a predicate over names already claimed in
//! a scope, the resolver derives a unique name: normalize, disambiguate
//! reserved roots, apply the sub-kind marker once, then append an
//! increasing integer suffix until the predicate clears. The name table
//! performs check-and-reserve as one atomic step so concurrent
//! resolutions in one scope are linearized and can never race to the
//! same name.
//!
//! Determinism holds for a fixed sequence of prior reservations; it is
//! not promised across process restarts.

use crate::recipe::UnitKind;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::convert::Infallible;

/// Marker segment prepended to prefixes that would shadow a system root.
pub const GEN_MARKER: &str = "gen";

/// Marker appended to accessor-kind unit names, exactly once.
pub const ACCESSOR_MARKER: &str = "$access";

/// Namespace roots generated units may never claim directly.
const RESERVED_ROOTS: &[&str] = &["kiln", "sys"];

/// Normalize a prefix into a legal unit-name stem.
///
/// Characters disallowed in a unit name map to `_`; an empty prefix
/// becomes `unit`; a prefix rooted in a reserved namespace is re-rooted
/// under the `gen/` marker segment.
pub fn normalize_prefix(prefix: &str) -> String {
    let mut out: String = prefix
        .chars()
        .map(|c| {
            if matches!(c, '.' | ';' | '[' | '<' | '>') || c.is_whitespace() || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    if out.is_empty() {
        out.push_str("unit");
    }
    let shadows_reserved = RESERVED_ROOTS
        .iter()
        .any(|root| out == *root || out.starts_with(&format!("{root}/")));
    if shadows_reserved {
        out.insert_str(0, "/");
        out.insert_str(0, GEN_MARKER);
    }
    out
}

/// Apply the sub-kind marker to a normalized prefix.
///
/// The marker is appended once, never cumulatively: a prefix that
/// already carries it (from a previous generation round) is returned
/// unchanged, so re-entrant generation cannot stack markers.
fn apply_kind(prefix: &str, kind: UnitKind) -> String {
    match kind {
        UnitKind::Plain => prefix.to_string(),
        UnitKind::Accessor if prefix.ends_with(ACCESSOR_MARKER) => prefix.to_string(),
        UnitKind::Accessor => format!("{prefix}{ACCESSOR_MARKER}"),
    }
}

/// Resolve a unique name against a fallible claimed-name predicate.
///
/// The predicate is queried with candidates `<stem>$0`, `<stem>$1`, …
/// until one is unclaimed; a predicate failure propagates. Callers that
/// need atomicity must hold their claim lock across this call (see
/// [`NameTable::reserve`]).
pub fn resolve<E>(
    prefix: &str,
    kind: UnitKind,
    mut taken: impl FnMut(&str) -> Result<bool, E>,
) -> Result<String, E> {
    let stem = apply_kind(&normalize_prefix(prefix), kind);
    let mut suffix = 0u64;
    loop {
        let candidate = format!("{stem}${suffix}");
        if !taken(&candidate)? {
            return Ok(candidate);
        }
        suffix += 1;
    }
}

/// The set of names reserved in one scope.
///
/// Reservation is check-and-reserve under one lock: the resolved name
/// is registered before the lock is released, never merely returned.
#[derive(Debug, Default)]
pub struct NameTable {
    reserved: Mutex<FxHashSet<String>>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve and atomically reserve a unique name.
    pub fn reserve(&self, prefix: &str, kind: UnitKind) -> String {
        let mut reserved = self.reserved.lock();
        let result = resolve::<Infallible>(prefix, kind, |candidate| {
            Ok(reserved.contains(candidate))
        });
        let name = match result {
            Ok(name) => name,
            Err(never) => match never {},
        };
        reserved.insert(name.clone());
        tracing::trace!(name = %name, "reserved unit name");
        name
    }

    /// Whether a name is already claimed in this scope.
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.lock().contains(name)
    }

    /// Number of names reserved so far.
    pub fn len(&self) -> usize {
        self.reserved.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sequential_reservations_count_up() {
        let table = NameTable::new();
        assert_eq!(table.reserve("acme/Point", UnitKind::Plain), "acme/Point$0");
        assert_eq!(table.reserve("acme/Point", UnitKind::Plain), "acme/Point$1");
        assert_eq!(table.reserve("acme/Point", UnitKind::Plain), "acme/Point$2");
    }

    #[test]
    fn test_disallowed_characters_escaped() {
        assert_eq!(normalize_prefix("a.b;c[d"), "a_b_c_d");
        assert_eq!(normalize_prefix("spaced name"), "spaced_name");
    }

    #[test]
    fn test_empty_prefix_becomes_unit() {
        assert_eq!(normalize_prefix(""), "unit");
    }

    #[test]
    fn test_reserved_root_rerooted_under_marker() {
        assert_eq!(normalize_prefix("kiln/Internal"), "gen/kiln/Internal");
        assert_eq!(normalize_prefix("sys"), "gen/sys");
        // Only whole-segment matches are re-rooted.
        assert_eq!(normalize_prefix("kilnworks/Gear"), "kilnworks/Gear");
    }

    #[test]
    fn test_accessor_marker_applied_once() {
        let table = NameTable::new();
        let name = table.reserve("acme/Point", UnitKind::Accessor);
        assert_eq!(name, "acme/Point$access$0");
    }

    #[test]
    fn test_accessor_marker_not_duplicated() {
        // A prefix carrying the marker from a previous generation
        // round gains only a fresh numeric suffix.
        let table = NameTable::new();
        let first = table.reserve("acme/Point", UnitKind::Accessor);
        let second = table.reserve(&first_stem(&first), UnitKind::Accessor);
        assert_eq!(second, "acme/Point$access$1");
        assert_eq!(second.matches(ACCESSOR_MARKER).count(), 1);
    }

    /// Strip the numeric suffix from a resolved name, as a re-entrant
    /// recipe would when deriving a dependent prefix.
    fn first_stem(name: &str) -> String {
        match name.rfind('$') {
            Some(at) => name[..at].to_string(),
            None => name.to_string(),
        }
    }

    #[test]
    fn test_resolver_skips_claimed_names() {
        let claimed = ["p$0", "p$1"];
        let name = resolve::<Infallible>("p", UnitKind::Plain, |c| {
            Ok(claimed.contains(&c))
        });
        assert_eq!(name, Ok("p$2".to_string()));
    }

    #[test]
    fn test_predicate_failure_propagates() {
        let result = resolve("p", UnitKind::Plain, |_| Err("registry unavailable"));
        assert_eq!(result, Err("registry unavailable"));
    }

    mod proptest_resolver {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalization_is_idempotent(prefix in ".{0,40}") {
                let once = normalize_prefix(&prefix);
                let twice = normalize_prefix(&once);
                prop_assert_eq!(once, twice);
            }

            #[test]
            fn resolved_name_is_never_claimed(
                prefix in "[a-z/$.]{1,12}",
                claimed_suffixes in proptest::collection::hash_set(0u64..8, 0..8),
            ) {
                let stem = normalize_prefix(&prefix);
                let claimed: Vec<String> =
                    claimed_suffixes.iter().map(|n| format!("{stem}${n}")).collect();
                let result = resolve::<Infallible>(&prefix, UnitKind::Plain, |c| {
                    Ok(claimed.iter().any(|x| x == c))
                });
                let name = match result {
                    Ok(name) => name,
                    Err(never) => match never {},
                };
                prop_assert!(!claimed.contains(&name));
            }

            #[test]
            fn accessor_marker_is_single_under_reapplication(prefix in "[a-z]{1,12}") {
                let once = apply_kind(&normalize_prefix(&prefix), UnitKind::Accessor);
                let twice = apply_kind(&once, UnitKind::Accessor);
                prop_assert_eq!(&once, &twice);
                prop_assert_eq!(twice.matches(ACCESSOR_MARKER).count(), 1);
            }
        }
    }
}
