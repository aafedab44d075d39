//! Callback-data vocabulary.
//!
//! Every inline button carries one of these actions, serialized with
//! [`CallbackAction::encode`] and parsed back exactly once at the routing
//! boundary. Unknown data maps to [`CallbackAction::Unknown`], which is
//! acknowledged and dropped.

use crate::flows::Field;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Global abort button present on most prompts.
    CancelConversation,
    /// Decorative keyboard separator row.
    Separator,

    // Summary-edit loop.
    ConfirmSubmission,
    CancelSubmission,
    EditField(Field),
    /// Close an open field editor without touching the field.
    KeepField,

    // Date triad checkpoint.
    DatesConfirm,
    DatesReset,

    // Category toggle keyboard.
    Category(String),
    CategoryReset,
    CategoryDone,

    // Optional-field skip buttons.
    SkipLinks,
    SkipGroupLink,
    SkipImage,

    // Command preludes.
    StartSubmit,
    DeclineSubmit,
    StartEdit,
    DeclineEdit,
    StartSearch,

    // Search menu.
    SearchToday,
    SearchTomorrow,
    SearchSpecificDate,
    SearchExit,
    SearchDateCancel,

    // Own-event selection.
    EditEvent(String),
    DeleteEvent(String),
    PushEvent(String),

    // Delete flow.
    DeleteConfirm,
    DeleteCancel,
    DeleteSelectCancel,

    // Push flow.
    PushConfirm,
    PushAbort,
    PushSelectCancel,

    // Moderation buttons on admin notices and management messages.
    Approve(String),
    Reject(String),
    AdminDelete(String),
    AdminBanDelete(String),
    AdminDeleteDirect,
    AdminDeleteCancel,

    // Template list and lifecycle.
    TemplateView(String),
    TemplateUse(String),
    TemplateDelete(String),
    TemplateBack,
    TemplateExit,
    TemplateDeleteConfirm,
    TemplateDeleteCancel,
    TemplateSaveYes,
    TemplateSaveNo,

    // Cancellation-confirmation gate (template-use context).
    CancelGateYes,
    CancelGateNo,

    Unknown(String),
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            CallbackAction::CancelConversation => "cancel_conversation".into(),
            CallbackAction::Separator => "noop_separator".into(),
            CallbackAction::ConfirmSubmission => "confirm_submission".into(),
            CallbackAction::CancelSubmission => "cancel_submission".into(),
            CallbackAction::EditField(field) => format!("edit_{}", field.key()),
            CallbackAction::KeepField => "keep_field".into(),
            CallbackAction::DatesConfirm => "dates_confirm".into(),
            CallbackAction::DatesReset => "dates_reset".into(),
            CallbackAction::Category(label) => format!("cat_{label}"),
            CallbackAction::CategoryReset => "cat_reset".into(),
            CallbackAction::CategoryDone => "cat_done".into(),
            CallbackAction::SkipLinks => "skip_links".into(),
            CallbackAction::SkipGroupLink => "skip_group_link".into(),
            CallbackAction::SkipImage => "skip_image".into(),
            CallbackAction::StartSubmit => "start_submit".into(),
            CallbackAction::DeclineSubmit => "decline_submit".into(),
            CallbackAction::StartEdit => "start_edit".into(),
            CallbackAction::DeclineEdit => "decline_edit".into(),
            CallbackAction::StartSearch => "start_search".into(),
            CallbackAction::SearchToday => "search_today".into(),
            CallbackAction::SearchTomorrow => "search_tomorrow".into(),
            CallbackAction::SearchSpecificDate => "search_date".into(),
            CallbackAction::SearchExit => "search_exit".into(),
            CallbackAction::SearchDateCancel => "search_date_cancel".into(),
            CallbackAction::EditEvent(id) => format!("edit_event_{id}"),
            CallbackAction::DeleteEvent(id) => format!("delete_event_{id}"),
            CallbackAction::PushEvent(id) => format!("push_event_{id}"),
            CallbackAction::DeleteConfirm => "delete_confirm".into(),
            CallbackAction::DeleteCancel => "delete_cancel".into(),
            CallbackAction::DeleteSelectCancel => "delete_select_cancel".into(),
            CallbackAction::PushConfirm => "push_confirm".into(),
            CallbackAction::PushAbort => "push_abort".into(),
            CallbackAction::PushSelectCancel => "push_select_cancel".into(),
            CallbackAction::Approve(id) => format!("approve_{id}"),
            CallbackAction::Reject(id) => format!("reject_{id}"),
            CallbackAction::AdminDelete(id) => format!("admin_delete_{id}"),
            CallbackAction::AdminBanDelete(id) => format!("admin_ban_delete_{id}"),
            CallbackAction::AdminDeleteDirect => "admin_delete_direct".into(),
            CallbackAction::AdminDeleteCancel => "admin_delete_cancel".into(),
            CallbackAction::TemplateView(id) => format!("tpl_view_{id}"),
            CallbackAction::TemplateUse(id) => format!("tpl_use_{id}"),
            CallbackAction::TemplateDelete(id) => format!("tpl_delete_{id}"),
            CallbackAction::TemplateBack => "tpl_back".into(),
            CallbackAction::TemplateExit => "tpl_exit".into(),
            CallbackAction::TemplateDeleteConfirm => "tpl_delete_confirm".into(),
            CallbackAction::TemplateDeleteCancel => "tpl_delete_cancel".into(),
            CallbackAction::TemplateSaveYes => "tpl_save_yes".into(),
            CallbackAction::TemplateSaveNo => "tpl_save_no".into(),
            CallbackAction::CancelGateYes => "cancel_yes".into(),
            CallbackAction::CancelGateNo => "cancel_no".into(),
            CallbackAction::Unknown(data) => data.clone(),
        }
    }

    pub fn parse(data: &str) -> CallbackAction {
        match data {
            "cancel_conversation" => return CallbackAction::CancelConversation,
            "noop_separator" => return CallbackAction::Separator,
            "confirm_submission" => return CallbackAction::ConfirmSubmission,
            "cancel_submission" => return CallbackAction::CancelSubmission,
            "keep_field" => return CallbackAction::KeepField,
            "dates_confirm" => return CallbackAction::DatesConfirm,
            "dates_reset" => return CallbackAction::DatesReset,
            "cat_reset" => return CallbackAction::CategoryReset,
            "cat_done" => return CallbackAction::CategoryDone,
            "skip_links" => return CallbackAction::SkipLinks,
            "skip_group_link" => return CallbackAction::SkipGroupLink,
            "skip_image" => return CallbackAction::SkipImage,
            "start_submit" => return CallbackAction::StartSubmit,
            "decline_submit" => return CallbackAction::DeclineSubmit,
            "start_edit" => return CallbackAction::StartEdit,
            "decline_edit" => return CallbackAction::DeclineEdit,
            "start_search" => return CallbackAction::StartSearch,
            "search_today" => return CallbackAction::SearchToday,
            "search_tomorrow" => return CallbackAction::SearchTomorrow,
            "search_date" => return CallbackAction::SearchSpecificDate,
            "search_exit" => return CallbackAction::SearchExit,
            "search_date_cancel" => return CallbackAction::SearchDateCancel,
            "delete_confirm" => return CallbackAction::DeleteConfirm,
            "delete_cancel" => return CallbackAction::DeleteCancel,
            "delete_select_cancel" => return CallbackAction::DeleteSelectCancel,
            "push_confirm" => return CallbackAction::PushConfirm,
            "push_abort" => return CallbackAction::PushAbort,
            "push_select_cancel" => return CallbackAction::PushSelectCancel,
            "admin_delete_direct" => return CallbackAction::AdminDeleteDirect,
            "admin_delete_cancel" => return CallbackAction::AdminDeleteCancel,
            "tpl_back" => return CallbackAction::TemplateBack,
            "tpl_exit" => return CallbackAction::TemplateExit,
            "tpl_delete_confirm" => return CallbackAction::TemplateDeleteConfirm,
            "tpl_delete_cancel" => return CallbackAction::TemplateDeleteCancel,
            "tpl_save_yes" => return CallbackAction::TemplateSaveYes,
            "tpl_save_no" => return CallbackAction::TemplateSaveNo,
            "cancel_yes" => return CallbackAction::CancelGateYes,
            "cancel_no" => return CallbackAction::CancelGateNo,
            _ => {}
        }

        for field in Field::ALL {
            if data == format!("edit_{}", field.key()) {
                return CallbackAction::EditField(field);
            }
        }

        // Longer prefixes first so `edit_event_` is not shadowed by a field.
        if let Some(id) = data.strip_prefix("edit_event_") {
            return CallbackAction::EditEvent(id.to_string());
        }
        if let Some(id) = data.strip_prefix("delete_event_") {
            return CallbackAction::DeleteEvent(id.to_string());
        }
        if let Some(id) = data.strip_prefix("push_event_") {
            return CallbackAction::PushEvent(id.to_string());
        }
        if let Some(id) = data.strip_prefix("admin_ban_delete_") {
            return CallbackAction::AdminBanDelete(id.to_string());
        }
        if let Some(id) = data.strip_prefix("admin_delete_") {
            return CallbackAction::AdminDelete(id.to_string());
        }
        if let Some(id) = data.strip_prefix("approve_") {
            return CallbackAction::Approve(id.to_string());
        }
        if let Some(id) = data.strip_prefix("reject_") {
            return CallbackAction::Reject(id.to_string());
        }
        if let Some(id) = data.strip_prefix("tpl_view_") {
            return CallbackAction::TemplateView(id.to_string());
        }
        if let Some(id) = data.strip_prefix("tpl_use_") {
            return CallbackAction::TemplateUse(id.to_string());
        }
        if let Some(id) = data.strip_prefix("tpl_delete_") {
            return CallbackAction::TemplateDelete(id.to_string());
        }
        if let Some(label) = data.strip_prefix("cat_") {
            return CallbackAction::Category(label.to_string());
        }

        CallbackAction::Unknown(data.to_string())
    }
}
