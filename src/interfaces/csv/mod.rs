pub mod card_range_reader;
