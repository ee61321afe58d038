/// Which CLI command is reading the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Run,
    Sweep,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Run => "RUN",
            CommandKind::Sweep => "SWEEP",
        }
    }
}

/// Registry of consumed JSON-pointer prefixes per command.
///
/// Must reflect what `settings` actually reads for that command:
/// - `LedgerSettings::from_config_json`: /ledger/*
/// - `RunSettings::from_config_json`: /run/start, /run/end
/// - `SweepSettings::from_config_json` (sweep only): /sweep/commission_per_share
pub fn consumed_pointers(kind: CommandKind) -> &'static [&'static str] {
    match kind {
        CommandKind::Run => RUN,
        CommandKind::Sweep => SWEEP,
    }
}

static RUN: &[&str] = &[
    "/ledger/commission_per_share",
    "/ledger/rebalance_tolerance",
    "/ledger/track_unsized",
    "/run/start",
    "/run/end",
];

static SWEEP: &[&str] = &[
    "/ledger/commission_per_share",
    "/ledger/rebalance_tolerance",
    "/ledger/track_unsized",
    "/run/start",
    "/run/end",
    "/sweep/commission_per_share",
];
