pub mod bootstrap;
pub mod commands;
pub mod countdown;
pub mod cycle_store;
pub mod history;
pub mod new_cycle_form;
