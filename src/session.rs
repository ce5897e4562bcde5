/// Session orchestrating resolve, synthesize, composite and encode for one script.
pub mod render_session;
