//! Command table for the Gearman binary protocol.
//!
//! Every packet on the wire carries a numeric command code; the payload is a
//! sequence of named fields determined by that code. This module holds the
//! static name/code/field-list table both directions of the protocol share.

/// Request magic marker: frames travelling client/worker -> server.
pub const REQ_MAGIC: [u8; 4] = *b"\0REQ";

/// Response magic marker: frames travelling server -> client/worker.
pub const RES_MAGIC: [u8; 4] = *b"\0RES";

/// Header size in bytes: 4 magic + 4 command code + 4 payload length.
pub const HEADER_SIZE: usize = 12;

/// Default maximum accepted payload size (64 MB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// One entry of the protocol command table.
#[derive(Debug, PartialEq, Eq)]
pub struct Command {
    /// Wire name, e.g. `"submit_job"`.
    pub name: &'static str,
    /// Numeric command code carried in the header.
    pub code: u32,
    /// Ordered field names. The final field is raw binary; the preceding
    /// ones are NUL-terminated on the wire.
    pub fields: &'static [&'static str],
}

/// The full command table.
///
/// Codes and field orderings follow the Gearman protocol. Client submission
/// commands, the responses they trigger, and the worker-side commands reusing
/// the same wire primitives all live in one table so encode and decode share
/// a single source of truth.
pub const COMMANDS: &[Command] = &[
    Command { name: "can_do", code: 1, fields: &["func"] },
    Command { name: "cant_do", code: 2, fields: &["func"] },
    Command { name: "reset_abilities", code: 3, fields: &[] },
    Command { name: "pre_sleep", code: 4, fields: &[] },
    Command { name: "noop", code: 6, fields: &[] },
    Command { name: "submit_job", code: 7, fields: &["func", "uniq", "arg"] },
    Command { name: "job_created", code: 8, fields: &["handle"] },
    Command { name: "grab_job", code: 9, fields: &[] },
    Command { name: "no_job", code: 10, fields: &[] },
    Command { name: "job_assign", code: 11, fields: &["handle", "func", "arg"] },
    Command { name: "work_status", code: 12, fields: &["handle", "numerator", "denominator"] },
    Command { name: "work_complete", code: 13, fields: &["handle", "result"] },
    Command { name: "work_fail", code: 14, fields: &["handle"] },
    Command { name: "get_status", code: 15, fields: &["handle"] },
    Command { name: "echo_req", code: 16, fields: &["text"] },
    Command { name: "echo_res", code: 17, fields: &["text"] },
    Command { name: "submit_job_bg", code: 18, fields: &["func", "uniq", "arg"] },
    Command { name: "error", code: 19, fields: &["err_code", "err_text"] },
    Command {
        name: "status_res",
        code: 20,
        fields: &["handle", "known", "running", "numerator", "denominator"],
    },
    Command { name: "submit_job_high", code: 21, fields: &["func", "uniq", "arg"] },
    Command { name: "set_client_id", code: 22, fields: &["client_id"] },
    Command { name: "can_do_timeout", code: 23, fields: &["func", "timeout"] },
    Command { name: "submit_job_high_bg", code: 32, fields: &["func", "uniq", "arg"] },
    Command { name: "submit_job_low", code: 33, fields: &["func", "uniq", "arg"] },
    Command { name: "submit_job_low_bg", code: 34, fields: &["func", "uniq", "arg"] },
];

/// Look up a command by wire name.
pub fn by_name(name: &str) -> Option<&'static Command> {
    COMMANDS.iter().find(|c| c.name == name)
}

/// Look up a command by numeric code.
pub fn by_code(code: u32) -> Option<&'static Command> {
    COMMANDS.iter().find(|c| c.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        let cmd = by_name("submit_job").unwrap();
        assert_eq!(cmd.code, 7);
        assert_eq!(cmd.fields, &["func", "uniq", "arg"]);

        assert!(by_name("not_a_command").is_none());
    }

    #[test]
    fn test_lookup_by_code() {
        let cmd = by_code(8).unwrap();
        assert_eq!(cmd.name, "job_created");
        assert_eq!(cmd.fields, &["handle"]);

        assert!(by_code(999).is_none());
        assert!(by_code(5).is_none()); // unassigned in the protocol
    }

    #[test]
    fn test_submission_variants_present() {
        // The six priority/background submission commands.
        for (name, code) in [
            ("submit_job", 7),
            ("submit_job_high", 21),
            ("submit_job_low", 33),
            ("submit_job_bg", 18),
            ("submit_job_high_bg", 32),
            ("submit_job_low_bg", 34),
        ] {
            let cmd = by_name(name).unwrap();
            assert_eq!(cmd.code, code);
            assert_eq!(cmd.fields, &["func", "uniq", "arg"]);
        }
    }

    #[test]
    fn test_codes_are_unique() {
        for (i, a) in COMMANDS.iter().enumerate() {
            for b in &COMMANDS[i + 1..] {
                assert_ne!(a.code, b.code, "{} and {} share a code", a.name, b.name);
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn test_magic_markers() {
        assert_eq!(&REQ_MAGIC, b"\0REQ");
        assert_eq!(&RES_MAGIC, b"\0RES");
        assert_eq!(HEADER_SIZE, 12);
    }
}
