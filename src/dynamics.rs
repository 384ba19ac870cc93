use bevy_ecs::{intern::Interned, schedule::ScheduleLabel};
use tracing::debug;

use crate::{
    accumulator::Accumulator, friction::PlatformReaction, locomotion::move_characters, prelude::*,
};

pub(super) fn plugin(schedule: Interned<dyn ScheduleLabel>) -> impl Fn(&mut App) {
    move |app: &mut App| {
        app.add_systems(
            schedule,
            apply_platform_reactions
                .in_set(TreadSystems::MoveCharacters)
                .after(move_characters),
        );
    }
}

/// Reactions riders owe their platforms this tick. Filled while moving, drained before
/// integration.
#[derive(Resource, Default, Debug)]
pub struct PlatformReactions(Vec<PlatformReaction>);

impl PlatformReactions {
    pub fn push(&mut self, reaction: PlatformReaction) {
        self.0.push(reaction);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn apply_platform_reactions(
    mut reactions: ResMut<PlatformReactions>,
    mut platforms: Query<&mut Accumulator, Without<Packed>>,
) {
    for reaction in reactions.0.drain(..) {
        let Ok(mut acc) = platforms.get_mut(reaction.platform) else {
            debug!("platform {} vanished before its reaction landed", reaction.platform);
            continue;
        };
        acc.velocity += reaction.acceleration;
    }
}
