use std::sync::Arc;

use tracing::{debug, info, warn};

use facultag_core::catalog::{CategoryCatalog, MENU_PAGE_SIZE};

use crate::events::{
    ContactAddedEvent, EventContext, InboundEvent, PostbackEvent, ReplyToken, TextMessageEvent,
};
use crate::messages::{
    acknowledgement_text, category_menu, change_category_prompt, selection_confirmation,
    welcome_text, MessageError, OutboundMessage, OutboundReply,
};
use crate::postback::PostbackCommand;
use crate::provisioner::TagProvisioner;

/// Exact, case-sensitive substring that asks for the category menu again.
pub const CHANGE_CATEGORY_TRIGGER: &str = "เปลี่ยนคณะ";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(OutboundReply),
    /// Handled, nothing to send.
    Processed,
    Ignored,
}

impl HandlerResult {
    pub fn reply(&self) -> Option<&OutboundReply> {
        match self {
            Self::Responded(reply) => Some(reply),
            Self::Processed | Self::Ignored => None,
        }
    }
}

pub struct EventRouter {
    catalog: Arc<CategoryCatalog>,
    provisioner: Arc<TagProvisioner>,
}

impl EventRouter {
    pub fn new(catalog: Arc<CategoryCatalog>, provisioner: Arc<TagProvisioner>) -> Self {
        Self { catalog, provisioner }
    }

    pub fn catalog(&self) -> &CategoryCatalog {
        &self.catalog
    }

    pub async fn route(&self, event: &InboundEvent, ctx: &EventContext) -> HandlerResult {
        match event {
            InboundEvent::ContactAdded(event) => self.contact_added(event, ctx),
            InboundEvent::Postback(event) => self.postback(event, ctx).await,
            InboundEvent::TextMessage(event) => self.text_message(event, ctx),
            InboundEvent::Unsupported { event_type } => {
                debug!(
                    event_name = "line.event.ignored",
                    correlation_id = %ctx.correlation_id,
                    event_type = %event_type,
                    "unsupported event ignored"
                );
                HandlerResult::Ignored
            }
        }
    }

    fn contact_added(&self, event: &ContactAddedEvent, ctx: &EventContext) -> HandlerResult {
        info!(
            event_name = "line.contact.added",
            correlation_id = %ctx.correlation_id,
            user_id = %event.user_id,
            "new contact, sending category menu"
        );
        respond(
            &event.reply_token,
            category_menu(&self.catalog, 0).map(|menu| vec![welcome_text(), menu]),
            ctx,
        )
    }

    async fn postback(&self, event: &PostbackEvent, ctx: &EventContext) -> HandlerResult {
        match PostbackCommand::decode(&event.payload, &self.catalog) {
            Some(PostbackCommand::SelectCategory(index)) => {
                let Some(category) = self.catalog.get(index) else {
                    return HandlerResult::Processed;
                };

                if let Err(error) =
                    self.provisioner.ensure_user_tagged(&event.user_id, category.label()).await
                {
                    warn!(
                        event_name = "line.tag.provision_failed",
                        correlation_id = %ctx.correlation_id,
                        user_id = %event.user_id,
                        tag_name = category.label(),
                        stage = %error.stage,
                        status = error.status(),
                        body = error.body().unwrap_or(""),
                        error = %error,
                        "tag provisioning failed; confirmation is still sent"
                    );
                }

                respond(&event.reply_token, Ok(vec![selection_confirmation(category.label())]), ctx)
            }
            Some(PostbackCommand::ShowMoreCategories) => {
                if self.catalog.len() > 2 * MENU_PAGE_SIZE {
                    warn!(
                        event_name = "line.menu.truncated",
                        correlation_id = %ctx.correlation_id,
                        categories = self.catalog.len(),
                        "categories beyond the second menu page cannot be selected"
                    );
                }
                match category_menu(&self.catalog, 1) {
                    Ok(menu) => respond(&event.reply_token, Ok(vec![menu]), ctx),
                    Err(MessageError::NoActions) => {
                        warn!(
                            event_name = "line.menu.empty_page",
                            correlation_id = %ctx.correlation_id,
                            user_id = %event.user_id,
                            "no categories on the second menu page"
                        );
                        HandlerResult::Processed
                    }
                    Err(error) => respond(&event.reply_token, Err(error), ctx),
                }
            }
            None => {
                warn!(
                    event_name = "line.postback.unknown",
                    correlation_id = %ctx.correlation_id,
                    user_id = %event.user_id,
                    payload = %event.payload,
                    "unrecognised postback payload"
                );
                HandlerResult::Processed
            }
        }
    }

    fn text_message(&self, event: &TextMessageEvent, ctx: &EventContext) -> HandlerResult {
        if event.text.contains(CHANGE_CATEGORY_TRIGGER) {
            debug!(
                event_name = "line.menu.requested",
                correlation_id = %ctx.correlation_id,
                user_id = %event.user_id,
            );
            return respond(
                &event.reply_token,
                category_menu(&self.catalog, 0).map(|menu| vec![change_category_prompt(), menu]),
                ctx,
            );
        }

        respond(&event.reply_token, Ok(vec![acknowledgement_text()]), ctx)
    }
}

fn respond(
    reply_token: &ReplyToken,
    messages: Result<Vec<OutboundMessage>, MessageError>,
    ctx: &EventContext,
) -> HandlerResult {
    match messages.and_then(|messages| OutboundReply::new(reply_token.clone(), messages)) {
        Ok(reply) => HandlerResult::Responded(reply),
        Err(error) => {
            warn!(
                event_name = "line.reply.build_failed",
                correlation_id = %ctx.correlation_id,
                error = %error,
                "could not build reply"
            );
            HandlerResult::Processed
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use facultag_core::catalog::{truncate_label, CategoryCatalog, BUTTON_LABEL_LIMIT};
    use facultag_core::domain::contact::UserId;

    use super::{EventRouter, HandlerResult};
    use crate::client::ApiError;
    use crate::events::{
        ContactAddedEvent, EventContext, InboundEvent, PostbackEvent, ReplyToken,
        TextMessageEvent,
    };
    use crate::memory::{FailurePoint, InMemoryLineApi, RecordedCall};
    use crate::messages::{
        selection_confirmation, Action, OutboundMessage, ACKNOWLEDGEMENT_TEXT,
        CHANGE_CATEGORY_PROMPT, WELCOME_TEXT,
    };
    use crate::provisioner::TagProvisioner;

    fn router_with(catalog: CategoryCatalog) -> (EventRouter, Arc<InMemoryLineApi>) {
        let api = Arc::new(InMemoryLineApi::new());
        let provisioner = Arc::new(TagProvisioner::new(api.clone()));
        (EventRouter::new(Arc::new(catalog), provisioner), api)
    }

    fn postback(payload: &str) -> InboundEvent {
        InboundEvent::Postback(PostbackEvent {
            user_id: UserId("U1".to_owned()),
            reply_token: ReplyToken("rt-1".to_owned()),
            payload: payload.to_owned(),
        })
    }

    fn text(body: &str) -> InboundEvent {
        InboundEvent::TextMessage(TextMessageEvent {
            user_id: UserId("U1".to_owned()),
            reply_token: ReplyToken("rt-1".to_owned()),
            text: body.to_owned(),
        })
    }

    fn messages(result: &HandlerResult) -> &[OutboundMessage] {
        result.reply().map(|reply| reply.messages.as_slice()).unwrap_or(&[])
    }

    fn button_labels(message: &OutboundMessage) -> Vec<String> {
        message
            .actions()
            .iter()
            .map(|action| match action {
                Action::Postback { label, .. } => label.clone(),
            })
            .collect()
    }

    #[tokio::test]
    async fn contact_added_gets_welcome_and_first_page() {
        let catalog = CategoryCatalog::default();
        let expected: Vec<String> =
            catalog.page(0).iter().map(|category| category.display_label()).collect();
        let (router, api) = router_with(catalog);

        let event = InboundEvent::ContactAdded(ContactAddedEvent {
            user_id: UserId("U1".to_owned()),
            reply_token: ReplyToken("rt-follow".to_owned()),
        });
        let result = router.route(&event, &EventContext::default()).await;

        let reply = result.reply().expect("reply");
        assert_eq!(reply.reply_token, ReplyToken("rt-follow".to_owned()));
        assert_eq!(reply.messages.len(), 2);
        assert_eq!(reply.messages[0].as_text(), Some(WELCOME_TEXT));
        assert!(reply.messages[0].as_text().is_some_and(|text| text.contains("เลือกคณะ")));
        assert_eq!(button_labels(&reply.messages[1]), expected);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn every_valid_selection_provisions_the_full_label() {
        let catalog = CategoryCatalog::default();
        let labels: Vec<String> = catalog.labels().map(str::to_owned).collect();
        let (router, api) = router_with(catalog);

        for (index, label) in labels.iter().enumerate() {
            let event = postback(&format!("selectCategory:{index}"));
            let result = router.route(&event, &EventContext::default()).await;
            assert_eq!(messages(&result), &[selection_confirmation(label)]);
        }

        let created: Vec<String> = api
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::CreateTag { name } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(created, labels);
    }

    #[tokio::test]
    async fn selection_with_empty_tag_list_creates_then_associates() {
        let catalog = CategoryCatalog::default();
        let label = catalog.labels().nth(2).map(str::to_owned).expect("third category");
        let (router, api) = router_with(catalog);

        let result = router.route(&postback("selectCategory:2"), &EventContext::default()).await;

        let calls = api.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], RecordedCall::ListTags);
        assert_eq!(calls[1], RecordedCall::CreateTag { name: label.clone() });
        assert!(matches!(
            &calls[2],
            RecordedCall::AddTagToUser { user_id, .. } if user_id.0 == "U1"
        ));
        assert_eq!(messages(&result), &[selection_confirmation(&label)]);
    }

    #[tokio::test]
    async fn long_labels_are_truncated_on_buttons_but_not_in_provisioning() {
        let long = "Faculty of Veterinary Science";
        let catalog = CategoryCatalog::new([long, "Law"]).expect("catalog");
        let (router, api) = router_with(catalog);

        let menu = router.route(&text("เปลี่ยนคณะ"), &EventContext::default()).await;
        let labels = button_labels(&messages(&menu)[1]);
        assert_eq!(labels[0], truncate_label(long, BUTTON_LABEL_LIMIT));
        assert_eq!(labels[0], "Faculty of V...");

        router.route(&postback("selectCategory:0"), &EventContext::default()).await;
        assert!(api.calls().contains(&RecordedCall::CreateTag { name: long.to_owned() }));
    }

    #[tokio::test]
    async fn provisioning_failure_still_confirms() {
        let (router, api) = router_with(CategoryCatalog::default());
        api.fail(FailurePoint::ListTags, ApiError::Status { status: 500, body: "down".to_owned() });

        let result = router.route(&postback("selectCategory:1"), &EventContext::default()).await;

        assert_eq!(api.calls(), vec![RecordedCall::ListTags]);
        let label = router.catalog().labels().nth(1).expect("label").to_owned();
        assert_eq!(messages(&result), &[selection_confirmation(&label)]);
    }

    #[tokio::test]
    async fn show_more_lists_the_second_page() {
        let (router, api) = router_with(CategoryCatalog::default());

        let result = router.route(&postback("showMoreCategories"), &EventContext::default()).await;

        let reply_messages = messages(&result);
        assert_eq!(reply_messages.len(), 1);
        assert_eq!(reply_messages[0].actions().len(), 4);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn show_more_without_a_second_page_replies_nothing() {
        let catalog = CategoryCatalog::new(["Law", "Science"]).expect("catalog");
        let (router, _api) = router_with(catalog);

        let result = router.route(&postback("showMoreCategories"), &EventContext::default()).await;

        assert_eq!(result, HandlerResult::Processed);
    }

    #[tokio::test]
    async fn unknown_or_out_of_range_postbacks_are_no_ops() {
        let (router, api) = router_with(CategoryCatalog::default());

        for payload in ["faculty_1", "selectCategory:8", "selectCategory:x", ""] {
            let result = router.route(&postback(payload), &EventContext::default()).await;
            assert_eq!(result, HandlerResult::Processed, "payload {payload:?}");
        }
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn trigger_phrase_anywhere_in_text_shows_menu() {
        let (router, _api) = router_with(CategoryCatalog::default());

        let result =
            router.route(&text("ขอเปลี่ยนคณะหน่อยครับ"), &EventContext::default()).await;

        let reply_messages = messages(&result);
        assert_eq!(reply_messages.len(), 2);
        assert_eq!(reply_messages[0].as_text(), Some(CHANGE_CATEGORY_PROMPT));
        assert_eq!(reply_messages[1].actions().len(), 4);
    }

    #[tokio::test]
    async fn other_text_gets_the_acknowledgement_and_no_remote_calls() {
        let (router, api) = router_with(CategoryCatalog::default());

        let result = router.route(&text("สวัสดี"), &EventContext::default()).await;

        assert_eq!(messages(&result), &[OutboundMessage::text(ACKNOWLEDGEMENT_TEXT)]);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn unsupported_events_are_ignored() {
        let (router, _api) = router_with(CategoryCatalog::default());
        let event = InboundEvent::Unsupported { event_type: "unfollow".to_owned() };

        assert_eq!(router.route(&event, &EventContext::default()).await, HandlerResult::Ignored);
    }
}
