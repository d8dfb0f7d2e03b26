mod child;
mod ids;
mod progress;
mod record;
mod settings;
mod subject;

pub use ids::{ChildId, ParentId, ParseIdError};

pub use child::{AgeBand, ChildProfile};
pub use progress::{
    ChildProgress, CohortProgress, LessonProgress, MixedGroup, ProgressSnapshot, ScoreStats,
    SubjectProgress, WeeklyActivity,
};
pub use record::{Confidence, RawActivityRecord, SourceKind};
pub use settings::{ProgressSettings, ProgressSettingsDraft, SettingsError};
pub use subject::{CanonicalSubject, SubjectMatch, UnknownSubjectError};
