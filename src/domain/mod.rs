//! Domain layer: the message catalog, card ranges, challenge outcomes and the
//! ports roles use to reach each other and their collaborators.

pub mod card_range;
pub mod messages;
pub mod outcome;
pub mod ports;
