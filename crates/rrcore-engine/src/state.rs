/// The recording half of the state machine (spec.md §4.10). `Init` has no
/// representation here: a `Recorder` only exists once `start()` has already
/// produced an `Open` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Open,
    Active,
    Draining,
    Closed,
}

/// The replay half of the state machine (spec.md §4.10). `Init` is likewise
/// absent: a `Player` only exists once `load()` has succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Loaded,
    Replaying,
    Drained,
}
