//! Invocation-identity tags.

/// Identity of the function invocation, as reported by the host runtime.
#[derive(Clone, Debug)]
pub struct FunctionContext {
    pub function_name: String,
    pub invoked_function_arn: String,
}

impl FunctionContext {
    pub fn new(
        function_name: impl Into<String>,
        invoked_function_arn: impl Into<String>,
    ) -> Self {
        Self {
            function_name: function_name.into(),
            invoked_function_arn: invoked_function_arn.into(),
        }
    }
}

/// Descriptive tags for a function invocation.
///
/// Always emits `functionname` and `resource`. When the identifier parses
/// as a Lambda ARN, `aws_account` and `region` are appended; a malformed
/// identifier is tolerated and simply yields the first two tags.
pub fn default_tags(context: &FunctionContext) -> Vec<String> {
    let mut tags = vec![
        format!("functionname:{}", context.function_name),
        format!("resource:{}", context.function_name),
    ];

    if let Some((region, account)) = parse_lambda_arn(&context.invoked_function_arn) {
        tags.push(format!("aws_account:{account}"));
        tags.push(format!("region:{region}"));
    }

    tags
}

/// Pull `(region, account)` out of `arn:aws:lambda:<region>:<account>:...`.
fn parse_lambda_arn(arn: &str) -> Option<(&str, &str)> {
    let mut parts = arn.splitn(6, ':');
    if parts.next()? != "arn" || parts.next()? != "aws" || parts.next()? != "lambda" {
        return None;
    }
    let region = parts.next()?;
    let account = parts.next()?;
    // The resource segment must at least be present.
    parts.next()?;

    if region.is_empty()
        || !region
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return None;
    }
    if account.is_empty() || !account.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some((region, account))
}
