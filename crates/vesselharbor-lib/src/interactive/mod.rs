//! Interactive mode: the menu state machine and its terminal front end

pub mod state;
pub mod terminal;

pub use state::{
    CallResult, Event, FormMode, InteractiveController, MenuState, RemoteCall, Screen, accepts,
};
pub use terminal::TerminalDriver;
