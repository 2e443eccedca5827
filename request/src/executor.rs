use std::{future::Future, time::Duration};

use cfg_if::cfg_if;

pub(crate) fn spawn_local(fut: impl Future<Output = ()> + 'static) {
    cfg_if! {
        if #[cfg(test)] {
            tokio::task::spawn_local(fut);
        } else if #[cfg(any(feature = "hydrate", feature = "csr"))] {
            leptos::spawn_local(fut);
        } else if #[cfg(feature = "ssr")] {
            tokio::task::spawn_local(fut);
        } else {
            leptos::logging::debug_warn!("You are missing a Cargo feature for leptos_request. Please enable one of 'ssr', 'hydrate', or 'csr'.");
            leptos::spawn_local(fut);
        }
    }
}

pub(crate) async fn sleep(duration: Duration) {
    cfg_if! {
        if #[cfg(test)] {
            tokio::time::sleep(duration).await;
        } else if #[cfg(any(feature = "hydrate", feature = "csr"))] {
            gloo_timers::future::sleep(duration).await;
        } else if #[cfg(feature = "ssr")] {
            tokio::time::sleep(duration).await;
        } else {
            let _ = duration;
            leptos::logging::debug_warn!("You are missing a Cargo feature for leptos_request. Please enable one of 'ssr', 'hydrate', or 'csr'.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, rc::Rc};
    use tokio::task::LocalSet;

    #[tokio::test(start_paused = true)]
    async fn spawned_task_waits_for_sleep() {
        LocalSet::new()
            .run_until(async {
                let done = Rc::new(Cell::new(false));
                spawn_local({
                    let done = done.clone();
                    async move {
                        sleep(Duration::from_millis(10)).await;
                        done.set(true);
                    }
                });

                tokio::time::sleep(Duration::from_millis(5)).await;
                assert!(!done.get());

                tokio::time::sleep(Duration::from_millis(10)).await;
                assert!(done.get());
            })
            .await;
    }
}
