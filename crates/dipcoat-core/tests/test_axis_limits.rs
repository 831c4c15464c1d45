use dipcoat_core::{AxisState, LimitSide};
use proptest::prelude::*;

fn side_strategy() -> impl Strategy<Value = LimitSide> {
    prop_oneof![Just(LimitSide::Min), Just(LimitSide::Max)]
}

proptest! {
    #[test]
    fn at_limit_tracks_flags(changes in proptest::collection::vec((side_strategy(), any::<bool>()), 0..16)) {
        let mut axis = AxisState::default();
        for (side, active) in changes {
            axis.set_limit(side, active);
            prop_assert_eq!(axis.at_limit, axis.limit_min || axis.limit_max);
        }
    }

    #[test]
    fn blocking_limit_follows_direction(
        steps in any::<i64>(),
        limit_min in any::<bool>(),
        limit_max in any::<bool>(),
    ) {
        let mut axis = AxisState::default();
        axis.set_limit(LimitSide::Min, limit_min);
        axis.set_limit(LimitSide::Max, limit_max);

        let expected = match steps.signum() {
            1 if limit_max => Some(LimitSide::Max),
            -1 if limit_min => Some(LimitSide::Min),
            _ => None,
        };
        prop_assert_eq!(axis.blocking_limit(steps), expected);
    }
}
