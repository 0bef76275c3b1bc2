pub mod replay_buffer;
