pub mod history;
pub mod pairing;
pub mod tiebreak;
