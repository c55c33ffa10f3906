//! Scenario tests spanning the graph, coupling policies and scheduler

mod hierarchy;
