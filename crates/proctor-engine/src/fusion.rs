//! Signal fusion into a single per-frame verdict.

use proctor_models::{Verdict, ViolationKind};

/// Binary signals observed in one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub phone: bool,
    pub unknown_face: bool,
    pub talking: bool,
    pub side_look: bool,
}

impl Signals {
    pub fn any(&self) -> bool {
        self.phone || self.unknown_face || self.talking || self.side_look
    }
}

/// First matching condition wins:
/// phone, unknown face, talking with side-look, talking, side-look.
///
/// An unknown face outranks the behavioral signals, so a frame with an
/// unrecognized person never reports talking or side-look.
pub fn fuse(signals: Signals) -> Verdict {
    let kind = if signals.phone {
        ViolationKind::PhoneUsage
    } else if signals.unknown_face {
        ViolationKind::UnknownPerson
    } else if signals.talking && signals.side_look {
        ViolationKind::TalkingAndSideLook
    } else if signals.talking {
        ViolationKind::Talking
    } else if signals.side_look {
        ViolationKind::SideLook
    } else {
        return Verdict::none();
    };
    Verdict::violation(kind)
}
