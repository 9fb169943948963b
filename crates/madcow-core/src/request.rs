//! The per-line request record handed from protocol adapters to the dispatcher.

/// One inbound line of chat plus its protocol metadata.
///
/// Adapters build a request with [`Request::new`] and the builder methods,
/// then hand it to the [`Dispatcher`](crate::dispatcher::Dispatcher). The
/// addressing flags only ever move from `false` to `true`: an adapter may
/// pre-set `addressed`, and the [`AddressingResolver`](crate::addressing::AddressingResolver)
/// sets the rest while rewriting `message`.
///
/// A request lives for exactly one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    message: String,
    nick: String,
    channel: Option<String>,
    private: bool,
    addressed: bool,
    correction: bool,
    feedback: bool,
    colorize: bool,
    wrap: bool,
    send_to: Option<String>,
}

impl Request {
    /// Creates a request for `message` sent by `nick`.
    pub fn new(message: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            nick: nick.into(),
            ..Default::default()
        }
    }

    /// Sets the room/channel the line was said in.
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Marks the line as arriving on a one-to-one channel.
    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    /// Marks the line as already directed at the bot.
    pub fn addressed(mut self, addressed: bool) -> Self {
        self.addressed = self.addressed || addressed;
        self
    }

    /// Presentation hint: the sink may colorize output.
    pub fn colorize(mut self, colorize: bool) -> Self {
        self.colorize = colorize;
        self
    }

    /// Presentation hint: the sink may wrap long output.
    pub fn wrap(mut self, wrap: bool) -> Self {
        self.wrap = wrap;
        self
    }

    /// Sets the resolved destination (channel name or sender nick).
    pub fn send_to(mut self, target: impl Into<String>) -> Self {
        self.send_to = Some(target.into());
        self
    }

    /// Current (possibly addressing-stripped) message text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The sender of the line.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// The channel, or `None` for a private message.
    pub fn channel_name(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Whether the line arrived on a one-to-one channel.
    pub fn is_private(&self) -> bool {
        self.private
    }

    /// Whether the line is directed at the bot.
    pub fn is_addressed(&self) -> bool {
        self.addressed
    }

    /// Whether the line used the `no, bot, ...` correction form.
    pub fn is_correction(&self) -> bool {
        self.correction
    }

    /// Whether the line was a bare `bot?` ping.
    pub fn is_feedback(&self) -> bool {
        self.feedback
    }

    /// Presentation hint for the sink.
    pub fn should_colorize(&self) -> bool {
        self.colorize
    }

    /// Presentation hint for the sink.
    pub fn should_wrap(&self) -> bool {
        self.wrap
    }

    /// Where the adapter will deliver responses, if it resolved one.
    pub fn destination(&self) -> Option<&str> {
        self.send_to.as_deref()
    }

    /// Destination the sink should use: explicit target, else channel, else nick.
    pub fn reply_target(&self) -> &str {
        self.send_to
            .as_deref()
            .or(self.channel.as_deref())
            .unwrap_or(&self.nick)
    }

    pub(crate) fn rewrite(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub(crate) fn mark_addressed(&mut self) {
        self.addressed = true;
    }

    pub(crate) fn mark_correction(&mut self) {
        self.correction = true;
        self.addressed = true;
    }

    pub(crate) fn mark_feedback(&mut self) {
        self.feedback = true;
    }
}
