pub mod callback;
pub mod message;

use std::sync::Arc;
use teloxide::{dispatching::UpdateHandler, prelude::*};

use crate::bot::commands::Command;
use crate::bot::BotContext;

pub struct BotHandler {
    pub ctx: Arc<BotContext>,
}

impl BotHandler {
    pub fn new(ctx: Arc<BotContext>) -> Self {
        Self { ctx }
    }

    pub fn schema(&self) -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
        let ctx_command = self.ctx.clone();
        let ctx_photo = self.ctx.clone();
        let ctx_text = self.ctx.clone();
        let ctx_callback = self.ctx.clone();

        let messages = Update::filter_message()
            .branch(
                dptree::entry()
                    .filter_command::<Command>()
                    .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                        let ctx = ctx_command.clone();
                        async move { message::command_handler(bot, msg, cmd, ctx).await }
                    }),
            )
            .branch(
                dptree::filter(|msg: Message| msg.photo().is_some()).endpoint(move |bot: Bot, msg: Message| {
                    let ctx = ctx_photo.clone();
                    async move { message::photo_handler(bot, msg, ctx).await }
                }),
            )
            .branch(
                dptree::filter(|msg: Message| msg.text().is_some()).endpoint(move |bot: Bot, msg: Message| {
                    let ctx = ctx_text.clone();
                    async move { message::text_handler(bot, msg, ctx).await }
                }),
            );

        let callbacks = Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
            let ctx = ctx_callback.clone();
            async move { callback::callback_handler(bot, q, ctx).await }
        });

        dptree::entry().branch(messages).branch(callbacks)
    }
}
