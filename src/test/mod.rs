mod distance_vector;
mod forwarding_table;
mod scenario_spec;
mod trace;
