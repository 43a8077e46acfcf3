//! Marker types for the states of [`crate::AgentRuntime`].

#[derive(Debug)]
pub struct Idle;

#[derive(Debug)]
pub struct Thinking;

#[derive(Debug)]
pub struct Acting;

#[derive(Debug)]
pub struct Observing;

#[derive(Debug)]
pub struct Completed;

#[derive(Debug)]
pub struct Failed;

#[derive(Debug)]
pub struct Interrupted;
