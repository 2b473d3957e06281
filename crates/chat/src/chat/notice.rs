use ideasense_types::Stage;

pub const DESCRIBE_IDEA_NOTICE: &str = "Please Describe Your Idea.";
pub const ENTERING_STAGE_NOTICE: &str = "We are entering a new stage. You can return to previous stages to review content. Type continue to proceed.";
pub const LOAD_PREVIOUS_LABEL: &str = "Load previous messages";
pub const LOADING_LABEL: &str = "Loading...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLayout {
    /// Centered over an empty conversation.
    Hero,
    /// Rendered inline as an assistant bubble.
    Bubble,
}

/// Prompt shown in a stage that has no user input yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageNotice {
    DescribeIdea,
    EnteringStage,
}

impl StageNotice {
    pub fn text(&self) -> &'static str {
        match self {
            Self::DescribeIdea => DESCRIBE_IDEA_NOTICE,
            Self::EnteringStage => ENTERING_STAGE_NOTICE,
        }
    }

    pub fn layout(&self) -> NoticeLayout {
        match self {
            Self::DescribeIdea => NoticeLayout::Hero,
            Self::EnteringStage => NoticeLayout::Bubble,
        }
    }
}

/// Never shown while history is still loading, so the prompt cannot flash
/// over a conversation that turns out to have content.
pub fn stage_notice(stage: Stage, booting: bool, has_user_message: bool) -> Option<StageNotice> {
    if booting || has_user_message {
        return None;
    }
    match stage {
        Stage::Problem => Some(StageNotice::DescribeIdea),
        Stage::Market | Stage::Tech => Some(StageNotice::EnteringStage),
        Stage::Report => None,
    }
}

/// State of the "load previous messages" control above the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadAffordance {
    Hidden,
    Idle,
    Loading,
}

impl LoadAffordance {
    pub fn new(has_more: bool, loading: bool) -> Self {
        match (has_more, loading) {
            (false, _) => Self::Hidden,
            (true, false) => Self::Idle,
            (true, true) => Self::Loading,
        }
    }

    pub fn label(&self) -> Option<&'static str> {
        match self {
            Self::Hidden => None,
            Self::Idle => Some(LOAD_PREVIOUS_LABEL),
            Self::Loading => Some(LOADING_LABEL),
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self == Self::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_wait_for_boot_and_vanish_after_user_input() {
        assert_eq!(stage_notice(Stage::Problem, true, false), None);
        assert_eq!(
            stage_notice(Stage::Problem, false, false),
            Some(StageNotice::DescribeIdea)
        );
        assert_eq!(stage_notice(Stage::Market, false, true), None);

        let notice = stage_notice(Stage::Tech, false, false).unwrap();
        assert_eq!(notice.layout(), NoticeLayout::Bubble);
        assert!(notice.text().ends_with("Type continue to proceed."));
        assert_eq!(stage_notice(Stage::Report, false, false), None);
    }

    #[test]
    fn affordance_follows_paging_state() {
        assert_eq!(LoadAffordance::new(false, true).label(), None);
        assert_eq!(
            LoadAffordance::new(true, false).label(),
            Some("Load previous messages")
        );
        let loading = LoadAffordance::new(true, true);
        assert_eq!(loading.label(), Some("Loading..."));
        assert!(!loading.is_enabled());
    }
}
