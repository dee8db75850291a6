pub mod beat_clock;
