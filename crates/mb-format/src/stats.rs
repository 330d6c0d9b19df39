//! Batch statistics directives.
//!
//! [`BatchDirectives`] resolves the two directives available to subject
//! templates:
//!
//! - `%env{VAR}`: value of an environment variable, empty when unset
//! - `%events{selector}`: a count over the flushed batch
//!
//! Event selectors are matched case-insensitively, in this order:
//! `total` (or no parameter), `triggering`, `lost`, `nontriggering`, a
//! numeric level value, a level name, then `class.unrecoverable`,
//! `class.recoverable`, `class.information` and `class.debug`.

use std::env::VarError;

use mb_common::{Level, LevelClass, Record};
use tracing::{debug, warn};

use crate::error::DirectiveError;
use crate::template::Resolve;

const ENV_DIRECTIVE: &str = "env";
const EVENTS_DIRECTIVE: &str = "events";

/// Resolver over one flushed batch and its lost-event count.
#[derive(Debug, Clone, Copy)]
pub struct BatchDirectives<'a> {
    records: &'a [Record],
    lost: u64,
}

impl<'a> BatchDirectives<'a> {
    pub fn new(records: &'a [Record], lost: u64) -> Self {
        BatchDirectives { records, lost }
    }
}

impl Resolve for BatchDirectives<'_> {
    fn resolve(&self, name: &str, parameter: Option<&str>) -> Result<String, DirectiveError> {
        match name {
            ENV_DIRECTIVE => Ok(env_value(parameter)),
            EVENTS_DIRECTIVE => event_count(self.records, self.lost, parameter).map(|n| n.to_string()),
            other => Err(DirectiveError::unknown(other)),
        }
    }
}

/// Look up an environment variable, never failing.
fn env_value(parameter: Option<&str>) -> String {
    let Some(name) = parameter.filter(|p| !p.is_empty()) else {
        return String::new();
    };
    match std::env::var(name) {
        Ok(value) => value,
        Err(VarError::NotPresent) => {
            debug!(variable = %name, "environment variable not set; expanding to empty");
            String::new()
        }
        Err(VarError::NotUnicode(_)) => {
            warn!(variable = %name, "environment variable is not valid unicode; expanding to empty");
            String::new()
        }
    }
}

/// Count records in `records` matching an `events{...}` selector.
pub fn event_count(
    records: &[Record],
    lost: u64,
    parameter: Option<&str>,
) -> Result<u64, DirectiveError> {
    let selector = parameter.map(str::trim).unwrap_or("");
    let count_where = |pred: &dyn Fn(&Record) -> bool| records.iter().filter(|r| pred(r)).count() as u64;

    if selector.is_empty() || selector.eq_ignore_ascii_case("total") {
        return Ok(records.len() as u64);
    }
    if selector.eq_ignore_ascii_case("triggering") {
        return Ok(count_where(&|r| r.is_triggering()));
    }
    if selector.eq_ignore_ascii_case("lost") {
        return Ok(lost);
    }
    if selector.eq_ignore_ascii_case("nontriggering") {
        return Ok(count_where(&|r| !r.is_triggering()));
    }
    if selector.bytes().all(|b| b.is_ascii_digit()) {
        let value: i32 = selector
            .parse()
            .map_err(|_| DirectiveError::invalid(EVENTS_DIRECTIVE, selector))?;
        return Ok(count_where(&|r| r.level.value() == value));
    }
    if let Some(level) = Level::from_name(selector) {
        return Ok(count_where(&|r| r.level == level));
    }
    if let Some(class) = selector
        .get(..6)
        .filter(|prefix| prefix.eq_ignore_ascii_case("class."))
        .and_then(|_| class_from_name(&selector[6..]))
    {
        return Ok(count_where(&|r| r.level.class() == class));
    }

    Err(DirectiveError::invalid(EVENTS_DIRECTIVE, selector))
}

fn class_from_name(name: &str) -> Option<LevelClass> {
    [
        LevelClass::Unrecoverable,
        LevelClass::Recoverable,
        LevelClass::Information,
        LevelClass::Debug,
    ]
    .into_iter()
    .find(|class| class.as_str().eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::format;

    fn sample_batch() -> Vec<Record> {
        let mut emergency =
            Record::new(Level::Emergency, "An emergency").with_exception("Sample exception");
        emergency.mark_triggering();
        vec![
            emergency,
            Record::new(Level::Info, "Some information").with_exception("Sample exception"),
            Record::new(Level::Debug, "Debug 1").with_exception("Sample exception"),
            Record::new(Level::Debug, "Debug 2"),
        ]
    }

    #[test]
    fn test_event_counts() {
        let batch = sample_batch();
        let out = format(
            "total=%events{total} trig=%events{triggering} ~trig=%events{nontriggering} \
             f=%events{fatal} f=%events{emergency} i=%events{info} d=%events{debug} \
             lost=%events{lost} total=%events",
            &BatchDirectives::new(&batch, 45),
        );
        assert_eq!(out, "total=4 trig=1 ~trig=3 f=0 f=1 i=1 d=2 lost=45 total=4");
    }

    #[test]
    fn test_event_class_counts() {
        let batch = sample_batch();
        let out = format(
            "total=%events{total} u=%events{class.unrecoverable} r=%events{class.recoverable} \
             i=%events{class.information} d=%events{class.debug}",
            &BatchDirectives::new(&batch, 45),
        );
        assert_eq!(out, "total=4 u=1 r=0 i=1 d=2");
    }

    #[test]
    fn test_numeric_level_matches_aliases() {
        let batch = vec![
            Record::new(Level::Debug, "a"),
            Record::new(Level::Fine, "b"),
            Record::new(Level::Trace, "c"),
        ];
        assert_eq!(event_count(&batch, 0, Some("30000")), Ok(2));
        assert_eq!(event_count(&batch, 0, Some("20000")), Ok(1));
        assert_eq!(event_count(&batch, 0, Some("1")), Ok(0));
    }

    #[test]
    fn test_selectors_are_case_insensitive() {
        let batch = sample_batch();
        assert_eq!(event_count(&batch, 3, Some("TOTAL")), Ok(4));
        assert_eq!(event_count(&batch, 3, Some("Lost")), Ok(3));
        assert_eq!(event_count(&batch, 3, Some("CLASS.Debug")), Ok(2));
        assert_eq!(event_count(&batch, 3, Some("")), Ok(4));
    }

    #[test]
    fn test_invalid_selector() {
        let batch = sample_batch();
        assert_eq!(
            event_count(&batch, 0, Some("bogus")),
            Err(DirectiveError::invalid("events", "bogus"))
        );
        assert!(event_count(&batch, 0, Some("class.other")).is_err());
        assert!(event_count(&batch, 0, Some("99999999999")).is_err());
        assert_eq!(format("[%events{bogus}]", &BatchDirectives::new(&batch, 0)), "[]");
    }

    #[test]
    fn test_unknown_directive_is_empty() {
        let out = format("a%nothing{x}b", &BatchDirectives::new(&[], 0));
        assert_eq!(out, "ab");
    }

    #[test]
    fn test_env_directive() {
        std::env::set_var("MB_FORMAT_TEST_VAR", "hello");
        let resolver = BatchDirectives::new(&[], 0);
        assert_eq!(format("v=%env{MB_FORMAT_TEST_VAR}", &resolver), "v=hello");
        assert_eq!(format("v=%env{MB_FORMAT_TEST_UNSET_VAR}", &resolver), "v=");
        assert_eq!(format("v=%env{}", &resolver), "v=");
        assert_eq!(format("v=%env", &resolver), "v=");
    }

    #[test]
    fn test_percent_literals_with_directives() {
        let out = format("single %%, and two %%%%", &BatchDirectives::new(&[], 0));
        assert_eq!(out, "single %, and two %%");
    }
}
