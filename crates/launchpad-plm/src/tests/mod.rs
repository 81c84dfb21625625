//! Behavioural suites for launcher backend selection.
