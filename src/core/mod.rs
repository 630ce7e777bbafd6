// Core modules implementing parameter encoding, callback settlement, and error modeling.
pub mod callback;
pub mod error;
pub mod params;
pub mod script;
