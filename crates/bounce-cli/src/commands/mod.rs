pub mod allow;
pub mod ask;
pub mod focus;
pub mod reconcile;
pub mod serve;
