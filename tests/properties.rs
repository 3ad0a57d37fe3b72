//! Property tests for recording and counting.

use proptest::prelude::*;
use testkit_observe::mock::MockLiveValue;
use testkit_observe::observer::StreamObserverConfig;
use testkit_observe::producer::from_values;
use testkit_observe::recorder::Recorder;
use testkit_observe::scope::TokioScope;
use testkit_observe::{observe_stream, observe_value, AssertionFailure};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

proptest! {
    #[test]
    fn value_observer_keeps_every_update_in_order(
        updates in prop::collection::vec(any::<i64>(), 0..64),
    ) {
        let live: MockLiveValue<i64> = MockLiveValue::new();
        let observer = observe_value(live.clone());
        for update in &updates {
            live.set(*update);
        }

        prop_assert_eq!(observer.values(), updates.clone());
        prop_assert_eq!(observer.values(), observer.values());
        prop_assert_eq!(observer.recorder().check_values_eq(&updates), Ok(()));
    }

    #[test]
    fn value_count_succeeds_only_for_the_exact_length(len in 0usize..32, probe in -8isize..40) {
        let recorder = Recorder::new();
        for i in 0..len {
            recorder.push(i);
        }

        let result = recorder.check_value_count(probe);
        if probe < 0 {
            prop_assert!(matches!(result, Err(AssertionFailure::InvalidArgument(_))));
        } else if probe.unsigned_abs() == len {
            prop_assert_eq!(result, Ok(()));
        } else {
            prop_assert_eq!(
                result,
                Err(AssertionFailure::CountMismatch { expected: probe.unsigned_abs(), actual: len })
            );
        }
        prop_assert_eq!(recorder.check_no_values().is_ok(), len == 0);
    }

    #[test]
    fn index_is_in_range_only_below_length(len in 0usize..16, index in -4isize..20) {
        let recorder = Recorder::new();
        for i in 0..len {
            recorder.push(i);
        }

        let in_range = usize::try_from(index).is_ok_and(|i| i < len);
        prop_assert_eq!(recorder.check_value_at(index, |_| true).is_ok(), in_range);
    }

    #[test]
    fn only_the_first_terminal_signal_counts(
        signals in prop::collection::vec(any::<bool>(), 1..8),
    ) {
        let recorder: Recorder<u8> = Recorder::new();
        for &complete in &signals {
            if complete {
                recorder.complete();
            } else {
                recorder.fail(std::sync::Arc::new(std::io::Error::other("boom")));
            }
        }

        prop_assert_eq!(recorder.terminal_state().is_completed(), signals[0]);
        prop_assert_eq!(recorder.terminal_state().is_failed(), !signals[0]);
    }

    #[test]
    fn stream_observer_records_every_emission(
        values in prop::collection::vec(any::<u16>(), 0..64),
    ) {
        let rt = runtime();
        let recorded = rt.block_on({
            let values = values.clone();
            async move {
                let observer = observe_stream(
                    from_values(futures::stream::iter(values)),
                    TokioScope::current(),
                    StreamObserverConfig::new(),
                );
                observer.assert_complete().await;
                observer.values().await
            }
        });
        prop_assert_eq!(recorded, values);
    }
}
