pub mod note_scheduler;
