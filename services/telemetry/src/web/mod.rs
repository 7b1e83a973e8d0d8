pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the main handlers to make them easily accessible
// to the binary that will build the web server router.
pub use rest::{
    average_score_handler, delete_journey_handler, discount_handler, list_journeys_handler,
    score_eligibility_handler,
};
pub use ws_handler::ws_handler;
