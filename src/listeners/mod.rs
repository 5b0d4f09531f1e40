pub mod unread_counter;
