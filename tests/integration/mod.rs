//! Library integration tests against the local engine.

pub mod config_test;
pub mod environment_test;
pub mod explain_test;
pub mod graph_test;

use fragsql::engine::LocalEngine;
use fragsql::FragmentEnvironment;

/// Environment with an `orders` source and a `totals` sink.
pub fn shop_env() -> FragmentEnvironment<LocalEngine> {
    let mut env = FragmentEnvironment::new(LocalEngine::new());
    env.execute_script(
        "CREATE TABLE orders (id INT, user_id INT, amount DOUBLE);\n\
         CREATE TABLE totals (user_id INT, total DOUBLE)",
    )
    .unwrap();
    env
}
