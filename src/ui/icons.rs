pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const SEARCH: &str = "🔍";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const STATS: &str = "📊";
    pub const LINK: &str = "🔗";
    pub const DEL: &str = "🗑️";
    pub const DATABASE: &str = "🗄️";
    pub const CLOCK: &str = "⏱️";
    pub const PERSON: &str = "👤";
    pub const HOSPITAL: &str = "🏥";
    pub const RECORD: &str = "📋";
    pub const SEED: &str = "🌱";
    pub const CASCADE: &str = "🔴";
    pub const NULLED: &str = "🟠";
    pub const BLOCKED: &str = "⛔";
    pub const WRENCH: &str = "🔧";
}
