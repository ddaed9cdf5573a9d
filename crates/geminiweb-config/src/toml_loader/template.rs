//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> &'static str {
    r##"# geminiweb configuration
# Only override what you want to change -- missing fields use defaults.
# GEMINI_SECURE_1PSID, GEMINI_SECURE_1PSIDTS, GEMINI_PROXY and GEMINI_MODEL
# override the matching values below.

[auth]
# Copy these from the browser's cookies for gemini.google.com.
secure_1psid = ""
secure_1psidts = ""

[session]
# auto_refresh = true
# refresh_interval_secs = 540   # >= 60
# timeout_secs = 300
# proxy = ""                    # e.g. "http://127.0.0.1:8080"

[model]
# default = "unspecified"       # unspecified, gemini-2.5-flash, gemini-2.5-pro,
#                               # gemini-2.0-flash, gemini-2.0-flash-thinking

[cache]
# dir = ""                      # empty: platform cache directory

[logging]
# level = "info"                # trace, debug, info, warn, error
"##
}
