//! Sign-in, sign-out and sign-up

use std::time::Duration;

use soundcheck_common::fixtures::generate_user_email;
use tracing::info;

use crate::auth::{open_auth_form, require_sign_in, sign_out, sign_up, submit_auth_form};
use crate::error::E2eResult;
use crate::gate::Requirement;
use crate::page::testid;
use crate::selectors;
use crate::suite::{Suite, TestCase, TestContext};

const AUTH_ERROR_TIMEOUT: Duration = Duration::from_secs(10);

pub fn suite() -> Suite {
    Suite::new("auth")
        .describe("Listener authentication")
        .tag("auth")
        .test(
            TestCase::new("sign in and out", sign_in_and_out)
                .tag("smoke")
                .requires(Requirement::UserCredentials),
        )
        .test(
            TestCase::new("wrong password shows an error", wrong_password)
                .requires(Requirement::UserCredentials),
        )
        .test(TestCase::new("sign up a fixture user", sign_up_fixture_user).tag("signup"))
}

async fn sign_in_and_out(ctx: TestContext) -> E2eResult<()> {
    let credentials = ctx.env.require_user()?;
    require_sign_in(&ctx.page, credentials).await?;
    sign_out(&ctx.page).await?;

    let still_signed_in = ctx.page.is_visible(&testid(selectors::USER_MENU)).await?;
    crate::ensure!(!still_signed_in, "user menu still visible after sign-out");
    Ok(())
}

async fn wrong_password(ctx: TestContext) -> E2eResult<()> {
    let credentials = ctx.env.require_user()?;
    let page = &ctx.page;

    open_auth_form(page).await?;
    submit_auth_form(page, &credentials.email, "definitely-not-the-password").await?;

    let shown = page.appears(&testid(selectors::AUTH_ERROR), AUTH_ERROR_TIMEOUT).await;
    crate::ensure!(shown, "no auth error shown for a wrong password");

    let signed_in = page.is_visible(&testid(selectors::USER_MENU)).await?;
    crate::ensure!(!signed_in, "signed in with a wrong password");
    Ok(())
}

async fn sign_up_fixture_user(ctx: TestContext) -> E2eResult<()> {
    let email = generate_user_email();
    let password = format!("Pw-{}", &email[..email.find('@').unwrap_or(email.len())]);

    if !sign_up(&ctx.page, &email, &password).await? {
        crate::skip!("sign-up of {email} did not sign in (email confirmation required?)");
    }
    info!("Registered fixture user {}", email);
    Ok(())
}
