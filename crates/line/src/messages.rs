use serde::Serialize;
use thiserror::Error;

use facultag_core::catalog::{Category, CategoryCatalog};

use crate::events::ReplyToken;
use crate::postback::{encode_postback, PostbackCommand};

/// Platform limit on actions per buttons template.
pub const MAX_TEMPLATE_ACTIONS: usize = 4;
/// Platform limit on messages per reply or push.
pub const MAX_MESSAGES_PER_REPLY: usize = 5;

pub const MENU_ALT_TEXT: &str = "เลือกคณะของคุณ";
pub const MORE_MENU_ALT_TEXT: &str = "เลือกคณะของคุณ (เพิ่มเติม)";
pub const MENU_TITLE: &str = "เลือกคณะของคุณ";
pub const MENU_TEXT: &str = "กรุณาเลือกคณะที่คุณสังกัด";
pub const SHOW_MORE_LABEL: &str = "ดูคณะเพิ่มเติม";

pub const WELCOME_TEXT: &str = "สวัสดีครับ ยินดีต้อนรับสู่ LINE Official ของมหาวิทยาลัย\nเพื่อให้เราสามารถส่งข่าวสารที่เกี่ยวข้องได้ตรงกลุ่ม กรุณาเลือกคณะของคุณ";
pub const CHANGE_CATEGORY_PROMPT: &str = "คุณสามารถเลือกคณะใหม่ได้ที่นี่";
pub const ACKNOWLEDGEMENT_TEXT: &str =
    "ขอบคุณสำหรับข้อความ หากต้องการเปลี่ยนคณะ พิมพ์ 'เปลี่ยนคณะ'";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Postback {
        label: String,
        data: String,
        #[serde(rename = "displayText", skip_serializing_if = "Option::is_none")]
        display_text: Option<String>,
    },
}

impl Action {
    pub fn postback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Postback { label: label.into(), data: data.into(), display_text: None }
    }

    pub fn display_text(self, text: impl Into<String>) -> Self {
        match self {
            Self::Postback { label, data, .. } => {
                Self::Postback { label, data, display_text: Some(text.into()) }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Template {
    Buttons {
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        text: String,
        actions: Vec<Action>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuickReplyItem {
    Action { action: Action },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuickReply {
    pub items: Vec<QuickReplyItem>,
}

/// One message unit as the Messaging API expects it on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    Text {
        text: String,
        #[serde(rename = "quickReply", skip_serializing_if = "Option::is_none")]
        quick_reply: Option<QuickReply>,
    },
    Template {
        #[serde(rename = "altText")]
        alt_text: String,
        template: Template,
        #[serde(rename = "quickReply", skip_serializing_if = "Option::is_none")]
        quick_reply: Option<QuickReply>,
    },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into(), quick_reply: None }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            Self::Template { .. } => None,
        }
    }

    pub fn actions(&self) -> &[Action] {
        match self {
            Self::Template { template: Template::Buttons { actions, .. }, .. } => actions,
            Self::Text { .. } => &[],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("buttons template needs at least one action")]
    NoActions,
    #[error("buttons template allows at most {max} actions, got {count}")]
    TooManyActions { count: usize, max: usize },
    #[error("a reply carries 1..={max} messages, got {count}")]
    MessageCount { count: usize, max: usize },
}

/// Messages bound to the reply token they answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundReply {
    pub reply_token: ReplyToken,
    pub messages: Vec<OutboundMessage>,
}

impl OutboundReply {
    pub fn new(
        reply_token: ReplyToken,
        messages: Vec<OutboundMessage>,
    ) -> Result<Self, MessageError> {
        if messages.is_empty() || messages.len() > MAX_MESSAGES_PER_REPLY {
            return Err(MessageError::MessageCount {
                count: messages.len(),
                max: MAX_MESSAGES_PER_REPLY,
            });
        }
        Ok(Self { reply_token, messages })
    }
}

pub struct ButtonsMenuBuilder {
    alt_text: String,
    title: Option<String>,
    text: String,
    actions: Vec<Action>,
    quick_reply: Vec<QuickReplyItem>,
}

impl ButtonsMenuBuilder {
    pub fn new(alt_text: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            alt_text: alt_text.into(),
            title: None,
            text: text.into(),
            actions: Vec::new(),
            quick_reply: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn actions<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.actions.extend(builder.build());
        self
    }

    pub fn quick_reply<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.quick_reply
            .extend(builder.build().into_iter().map(|action| QuickReplyItem::Action { action }));
        self
    }

    pub fn build(self) -> Result<OutboundMessage, MessageError> {
        if self.actions.is_empty() {
            return Err(MessageError::NoActions);
        }
        if self.actions.len() > MAX_TEMPLATE_ACTIONS {
            return Err(MessageError::TooManyActions {
                count: self.actions.len(),
                max: MAX_TEMPLATE_ACTIONS,
            });
        }

        let quick_reply =
            (!self.quick_reply.is_empty()).then(|| QuickReply { items: self.quick_reply });
        Ok(OutboundMessage::Template {
            alt_text: self.alt_text,
            template: Template::Buttons { title: self.title, text: self.text, actions: self.actions },
            quick_reply,
        })
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    actions: Vec<Action>,
}

impl ActionsBuilder {
    pub fn action(&mut self, action: Action) -> &mut Self {
        self.actions.push(action);
        self
    }

    fn build(self) -> Vec<Action> {
        self.actions
    }
}

fn category_action(category: &Category) -> Action {
    Action::postback(category.display_label(), encode_postback(category.index()))
        .display_text(category.label())
}

/// Menu listing one page of the catalog.
///
/// The first page offers the next one through a quick reply so the template
/// itself never exceeds four buttons. Pages past the end yield
/// [`MessageError::NoActions`].
pub fn category_menu(
    catalog: &CategoryCatalog,
    page: usize,
) -> Result<OutboundMessage, MessageError> {
    let categories = catalog.page(page);
    let alt_text = if page == 0 { MENU_ALT_TEXT } else { MORE_MENU_ALT_TEXT };

    let mut builder =
        ButtonsMenuBuilder::new(alt_text, MENU_TEXT).title(MENU_TITLE).actions(|actions| {
            for category in categories {
                actions.action(category_action(category));
            }
        });

    if page == 0 && catalog.page_count() > 1 {
        builder = builder.quick_reply(|items| {
            items.action(
                Action::postback(SHOW_MORE_LABEL, PostbackCommand::ShowMoreCategories.encode())
                    .display_text(SHOW_MORE_LABEL),
            );
        });
    }

    builder.build()
}

pub fn welcome_text() -> OutboundMessage {
    OutboundMessage::text(WELCOME_TEXT)
}

/// Confirmation naming the full, untruncated category label.
pub fn selection_confirmation(label: &str) -> OutboundMessage {
    OutboundMessage::text(format!(
        "ขอบคุณที่แจ้งข้อมูล คุณได้รับการติด tag '{label}' เรียบร้อยแล้ว\n\nคุณจะได้รับข่าวสารที่เกี่ยวข้องกับคณะของคุณโดยเฉพาะ"
    ))
}

pub fn change_category_prompt() -> OutboundMessage {
    OutboundMessage::text(CHANGE_CATEGORY_PROMPT)
}

pub fn acknowledgement_text() -> OutboundMessage {
    OutboundMessage::text(ACKNOWLEDGEMENT_TEXT)
}
